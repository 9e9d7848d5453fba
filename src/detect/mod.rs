// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Privacy leak detectors
//!
//! Each detector is a pure function over a [`TxGraph`] and the optional [`Labels`], listed in
//! [`DETECTORS`]. Detectors share nothing but the graph, so [`run_all`] executes them in
//! parallel and returns their outputs in registry order.

use std::collections::BTreeSet;
use std::fmt;

use bitcoin::Txid;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::blockchain::Blockchain;
use crate::graph::{InputRef, TxGraph};
use crate::types::{KeychainKind, ScriptType, TxOutput};

pub mod address_reuse;
pub mod change;
pub mod cioh;
pub mod cluster_merge;
pub mod consolidation;
pub mod dust;
pub mod dust_spending;
pub mod exchange;
pub mod fingerprint;
pub mod script_mixing;
pub mod taint;
pub mod utxo_age;

pub use self::change::ChangeReason;
pub use self::cluster_merge::{FundingSource, InputSources};
pub use self::exchange::ExchangeSignal;
pub use self::fingerprint::FingerprintPattern;

/// Severity of a finding
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Weak signal
    Low,
    /// Probable leak
    Medium,
    /// Strong leak
    High,
    /// Provable leak
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// The kind of leak, one per detector
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// An owned address received in several transactions
    AddressReuse,
    /// Several owned inputs spent together
    Cioh,
    /// Dust received by an owned address
    Dust,
    /// Dust spent together with a normal input
    DustSpending,
    /// A change output is identifiable
    ChangeDetection,
    /// A UTXO was created by a consolidation
    ConsolidationOrigin,
    /// Inputs of different script types spent together
    ScriptTypeMixing,
    /// Inputs funded by unrelated transactions spent together
    ClusterMerge,
    /// UTXOs of very different ages
    UtxoAgeSpread,
    /// Funds received from an exchange batch withdrawal
    ExchangeOrigin,
    /// Funds merged with coins from a risky source
    Taint,
    /// Send transactions share a recognizable pattern
    BehavioralFingerprint,
}

/// Structured details of a finding
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Details {
    /// See [`address_reuse`]
    AddressReuse {
        address: String,
        keychain: KeychainKind,
        txids: Vec<ReuseTx>,
    },
    /// See [`cioh`]
    Cioh {
        txid: Txid,
        total_inputs: usize,
        owned_inputs: usize,
        outputs: usize,
        consolidation_shape: bool,
        owned: Vec<InputRef>,
        external: Vec<InputRef>,
    },
    /// See [`dust`]
    Dust {
        txid: Txid,
        address: String,
        value_sats: u64,
        strict: bool,
        spent: bool,
    },
    /// See [`dust_spending`]
    DustSpending {
        txid: Txid,
        dust: Vec<InputRef>,
        normal: Vec<InputRef>,
    },
    /// See [`change`]
    ChangeDetection {
        txid: Txid,
        reasons: Vec<ChangeReason>,
        change: Vec<TxOutput>,
    },
    /// See [`consolidation`]
    ConsolidationOrigin {
        txid: Txid,
        vout: u32,
        amount_sats: u64,
        inputs: usize,
        outputs: usize,
        owned_inputs: usize,
    },
    /// See [`script_mixing`]
    ScriptTypeMixing {
        txid: Txid,
        script_types: Vec<ScriptType>,
        inputs: Vec<TypedInput>,
    },
    /// See [`cluster_merge`]
    ClusterMerge {
        txid: Txid,
        sources: Vec<InputSources>,
    },
    /// See [`utxo_age`]
    UtxoAgeSpread {
        spread: u32,
        oldest: UtxoAge,
        newest: UtxoAge,
    },
    /// See [`utxo_age`]
    DormantUtxos { count: usize, threshold: u32 },
    /// See [`exchange`]
    ExchangeOrigin {
        txid: Txid,
        signals: Vec<ExchangeSignal>,
        received: Vec<TxOutput>,
    },
    /// See [`taint`]
    Taint {
        txid: Txid,
        tainted: Vec<InputRef>,
        clean: Vec<InputRef>,
    },
    /// See [`taint`]
    DirectTaint {
        txid: Txid,
        received: Vec<TxOutput>,
    },
    /// See [`fingerprint`]
    BehavioralFingerprint {
        send_transactions: usize,
        pattern: FingerprintPattern,
    },
}

/// A transaction in which a reused address received
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReuseTx {
    /// Transaction id
    pub txid: Txid,
    /// Confirmations of the decoded transaction, if known
    pub confirmations: Option<u32>,
}

/// An input with its script type and ownership
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TypedInput {
    /// Spent output
    #[serde(flatten)]
    pub input: InputRef,
    /// Script type of the spent output's address
    pub script_type: ScriptType,
    /// Whether the address is owned
    pub owned: bool,
}

/// Age of a UTXO
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UtxoAge {
    /// Funding transaction
    pub txid: Txid,
    /// Output index
    pub vout: u32,
    /// Confirmations
    pub confirmations: u32,
    /// Value in satoshi
    pub amount_sats: u64,
}

/// A detected privacy leak
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Finding {
    /// Kind of leak
    pub kind: FindingKind,
    /// Severity
    pub severity: Severity,
    /// Human readable description
    pub description: String,
    /// Structured details
    pub details: Details,
}

impl Finding {
    pub(crate) fn new<S: Into<String>>(
        kind: FindingKind,
        severity: Severity,
        description: S,
        details: Details,
    ) -> Self {
        Finding {
            kind,
            severity,
            description: description.into(),
            details,
        }
    }
}

/// Output of a single detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorOutput {
    /// Findings
    pub findings: Vec<Finding>,
    /// Warnings, same shape as findings
    pub warnings: Vec<Finding>,
}

impl DetectorOutput {
    pub(crate) fn finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub(crate) fn warning(&mut self, warning: Finding) {
        self.warnings.push(warning);
    }
}

/// Txids labeled by the caller through the history of other wallets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    /// Transactions of known risky wallets, `None` disables taint analysis
    pub risky_txids: Option<BTreeSet<Txid>>,
    /// Transactions of known exchange wallets
    pub exchange_txids: BTreeSet<Txid>,
}

impl Labels {
    /// Collect the txids in the history of the labeled wallets
    ///
    /// A wallet that can't be listed is logged and contributes nothing.
    pub fn load<B: Blockchain + ?Sized>(
        blockchain: &B,
        risky_wallets: &[String],
        exchange_wallets: &[String],
    ) -> Self {
        let risky_txids = if risky_wallets.is_empty() {
            None
        } else {
            Some(wallet_txids(blockchain, risky_wallets))
        };
        let exchange_txids = wallet_txids(blockchain, exchange_wallets);

        Labels {
            risky_txids,
            exchange_txids,
        }
    }
}

fn wallet_txids<B: Blockchain + ?Sized>(blockchain: &B, wallets: &[String]) -> BTreeSet<Txid> {
    let mut txids = BTreeSet::new();
    for wallet in wallets {
        match blockchain.list_transactions(wallet) {
            Ok(history) => {
                debug!("Labeled wallet `{}`: {} entries", wallet, history.len());
                txids.extend(history.into_iter().map(|r| r.txid));
            }
            Err(e) => warn!("Can't read labeled wallet `{}`: {}", wallet, e),
        }
    }

    txids
}

/// Signature shared by all the detectors
pub type DetectFn = fn(&TxGraph<'_>, &Labels) -> DetectorOutput;

/// A registered detector
#[derive(Clone, Copy)]
pub struct Detector {
    /// Kind of the findings it emits
    pub kind: FindingKind,
    /// Display name
    pub name: &'static str,
    /// Entry point
    pub run: DetectFn,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Every detector, in report order
pub const DETECTORS: &[Detector] = &[
    Detector {
        kind: FindingKind::AddressReuse,
        name: "Address reuse",
        run: address_reuse::detect,
    },
    Detector {
        kind: FindingKind::Cioh,
        name: "Common input ownership",
        run: cioh::detect,
    },
    Detector {
        kind: FindingKind::Dust,
        name: "Dust",
        run: dust::detect,
    },
    Detector {
        kind: FindingKind::DustSpending,
        name: "Dust spent with normal inputs",
        run: dust_spending::detect,
    },
    Detector {
        kind: FindingKind::ChangeDetection,
        name: "Change detection",
        run: change::detect,
    },
    Detector {
        kind: FindingKind::ConsolidationOrigin,
        name: "Consolidation origin",
        run: consolidation::detect,
    },
    Detector {
        kind: FindingKind::ScriptTypeMixing,
        name: "Script type mixing",
        run: script_mixing::detect,
    },
    Detector {
        kind: FindingKind::ClusterMerge,
        name: "Cluster merge",
        run: cluster_merge::detect,
    },
    Detector {
        kind: FindingKind::UtxoAgeSpread,
        name: "UTXO age spread",
        run: utxo_age::detect,
    },
    Detector {
        kind: FindingKind::ExchangeOrigin,
        name: "Exchange origin",
        run: exchange::detect,
    },
    Detector {
        kind: FindingKind::Taint,
        name: "Taint",
        run: taint::detect,
    },
    Detector {
        kind: FindingKind::BehavioralFingerprint,
        name: "Behavioral fingerprint",
        run: fingerprint::detect,
    },
];

/// Run every detector in parallel, returning the outputs in [`DETECTORS`] order
pub fn run_all(graph: &TxGraph<'_>, labels: &Labels) -> Vec<DetectorOutput> {
    DETECTORS
        .par_iter()
        .map(|detector| {
            let output = (detector.run)(graph, labels);
            info!(
                "{}: {} findings, {} warnings",
                detector.name,
                output.findings.len(),
                output.warnings.len()
            );
            output
        })
        .collect()
}

/// Whether a value is a multiple of 0.001 BTC
pub(crate) fn is_round(sats: u64) -> bool {
    sats > 0 && sats % 100_000 == 0
}

/// Owned and external resolved inputs of a transaction
pub(crate) fn split_inputs<'i>(
    graph: &TxGraph<'_>,
    inputs: &'i [InputRef],
) -> (Vec<&'i InputRef>, Vec<&'i InputRef>) {
    inputs
        .iter()
        .partition(|i| graph.owns(i.address.as_deref()))
}

/// Shortened txid for descriptions
pub(crate) fn short(txid: &Txid) -> String {
    let mut s = txid.to_string();
    s.truncate(16);
    s
}
