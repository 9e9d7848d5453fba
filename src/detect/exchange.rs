// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Exchange batch withdrawals
//!
//! A pure receipt with many outputs looks like an exchange paying out several customers at once.
//! The signals are:
//!
//! * the output count
//! * the number of distinct recipient addresses
//! * the txid appearing in the history of a known exchange wallet
//! * the resolved input total being large compared to the median output
//!
//! Two signals are enough to report the receipt.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::{split_inputs, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Outputs of a batch
pub const BATCH_OUTPUTS: usize = 5;
/// Input to median output ratio of a hot wallet
pub const HOT_WALLET_RATIO: f64 = 10.0;
/// Signals required to report a batch
pub const MIN_SIGNALS: usize = 2;

/// Evidence that a transaction is an exchange batch
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "signal")]
pub enum ExchangeSignal {
    /// Many outputs
    OutputCount {
        /// Outputs
        outputs: usize,
    },
    /// Many distinct recipients
    UniqueRecipients {
        /// Distinct output addresses
        addresses: usize,
    },
    /// The txid is in the history of a known exchange wallet
    KnownExchange,
    /// Inputs are much larger than the typical output
    HotWalletRatio {
        /// Resolved input total over the median output
        ratio: f64,
    },
}

impl fmt::Display for ExchangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeSignal::OutputCount { outputs } => write!(f, "high output count: {}", outputs),
            ExchangeSignal::UniqueRecipients { addresses } => {
                write!(f, "{} unique recipient addresses", addresses)
            }
            ExchangeSignal::KnownExchange => write!(f, "matches a known exchange wallet"),
            ExchangeSignal::HotWalletRatio { ratio } => {
                write!(f, "input/median-output ratio {:.0}x", ratio)
            }
        }
    }
}

/// Flag pure receipts that look like a batch withdrawal
pub fn detect(graph: &TxGraph<'_>, labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        let tx = match graph.fetch_tx(txid) {
            Some(tx) if tx.outputs.len() >= BATCH_OUTPUTS => tx,
            _ => continue,
        };

        let inputs = graph.input_addresses(txid);
        let (owned_in, _) = split_inputs(graph, &inputs);
        if !owned_in.is_empty() {
            // our own batch
            continue;
        }
        let received: Vec<_> = tx
            .outputs
            .iter()
            .filter(|o| graph.owns(o.address.as_deref()))
            .cloned()
            .collect();
        if received.is_empty() {
            continue;
        }

        let mut signals = vec![ExchangeSignal::OutputCount {
            outputs: tx.outputs.len(),
        }];

        let recipients: BTreeSet<_> = tx
            .outputs
            .iter()
            .filter_map(|o| o.address.as_deref())
            .filter(|a| !a.is_empty())
            .collect();
        if recipients.len() >= BATCH_OUTPUTS {
            signals.push(ExchangeSignal::UniqueRecipients {
                addresses: recipients.len(),
            });
        }

        if labels.exchange_txids.contains(txid) {
            signals.push(ExchangeSignal::KnownExchange);
        }

        let input_total: u64 = inputs.iter().map(|i| i.value_sats).sum();
        let mut values: Vec<_> = tx.outputs.iter().map(|o| o.value_sats).collect();
        values.sort_unstable();
        let median = values[values.len() / 2];
        if median > 0 {
            let ratio = input_total as f64 / median as f64;
            if ratio > HOT_WALLET_RATIO {
                signals.push(ExchangeSignal::HotWalletRatio { ratio });
            }
        }

        if signals.len() < MIN_SIGNALS {
            continue;
        }

        let listed: Vec<_> = signals.iter().map(ExchangeSignal::to_string).collect();
        output.finding(Finding::new(
            FindingKind::ExchangeOrigin,
            Severity::Medium,
            format!(
                "TX {} looks like an exchange batch withdrawal: {}",
                super::short(txid),
                listed.join("; ")
            ),
            Details::ExchangeOrigin {
                txid: *txid,
                signals,
                received,
            },
        ));
    }

    output
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;
    use crate::testutils::Fixture;

    fn batch(fx: &mut Fixture, label: &str, recipients: &[&str]) -> bitcoin::Txid {
        let hot = fx.coinbase(&format!("{}-hot", label), &[("bcrt1q-exchange", 10_000_000)]);
        let outputs: Vec<_> = recipients.iter().map(|r| (*r, 100_000)).collect();
        fx.tx(label, &[(hot, 0)], &outputs)
    }

    #[test]
    fn test_batch_withdrawal() {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        let txid = batch(
            &mut fx,
            "batch",
            &["bcrt1q-alice-0", "bcrt1q-b", "bcrt1q-c", "bcrt1q-d", "bcrt1q-e"],
        );
        fx.touch(txid);

        let output = detect(&fx.graph(), &Labels::default());
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].severity, Severity::Medium);
        assert_matches!(
            &output.findings[0].details,
            Details::ExchangeOrigin { signals, received, .. }
                if signals.len() == 3
                    && signals[0] == ExchangeSignal::OutputCount { outputs: 5 }
                    && signals[1] == ExchangeSignal::UniqueRecipients { addresses: 5 }
                    && signals[2] == ExchangeSignal::HotWalletRatio { ratio: 100.0 }
                    && received.len() == 1
        );
    }

    #[test]
    fn test_known_exchange_label() {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        // same recipient five times and no resolvable input: only labels can add a signal
        let txid = fx.tx(
            "batch",
            &[(crate::testutils::txid("unknown"), 0)],
            &[
                ("bcrt1q-alice-0", 1_000),
                ("bcrt1q-b", 1_000),
                ("bcrt1q-b", 1_000),
                ("bcrt1q-b", 1_000),
                ("bcrt1q-b", 1_000),
            ],
        );
        fx.touch(txid);

        let graph = fx.graph();
        assert!(detect(&graph, &Labels::default()).findings.is_empty());

        let labels = Labels {
            exchange_txids: vec![txid].into_iter().collect(),
            ..Default::default()
        };
        let output = detect(&graph, &labels);
        assert_matches!(
            &output.findings[0].details,
            Details::ExchangeOrigin { signals, .. }
                if signals.contains(&ExchangeSignal::KnownExchange)
        );
    }

    #[test]
    fn test_own_batch_ignored() {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        fx.receive_address("bcrt1q-alice-1");
        let a = fx.coinbase("a", &[("bcrt1q-alice-0", 10_000_000)]);
        let txid = fx.tx(
            "payout",
            &[(a, 0)],
            &[
                ("bcrt1q-alice-1", 100_000),
                ("bcrt1q-b", 100_000),
                ("bcrt1q-c", 100_000),
                ("bcrt1q-d", 100_000),
                ("bcrt1q-e", 100_000),
            ],
        );
        fx.touch(txid);

        assert!(detect(&fx.graph(), &Labels::default()).findings.is_empty());
    }
}
