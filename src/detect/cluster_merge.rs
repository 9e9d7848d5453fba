// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Cluster merge
//!
//! Each owned input of a transaction is traced one hop back, to the inputs of the transaction
//! that funded it. Two owned inputs whose funding transactions share no source were, until this
//! spend, unrelated on chain.
//!
//! Only the first hop is considered: two inputs whose histories join further back are still
//! reported as a merge.

use std::collections::BTreeSet;
use std::fmt;

use bitcoin::Txid;
use serde::Serialize;

use super::{split_inputs, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;
use crate::types::Funding;

/// Where the funding transaction of an input got its coins
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    /// Newly minted coins
    Coinbase,
    /// A previous transaction
    Tx(Txid),
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingSource::Coinbase => write!(f, "coinbase"),
            FundingSource::Tx(txid) => write!(f, "{}", super::short(txid)),
        }
    }
}

/// The sources of the funding transaction of an owned input
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InputSources {
    /// Funding transaction
    pub txid: Txid,
    /// Output index in the funding transaction
    pub vout: u32,
    /// Sources of the funding transaction
    pub funded_by: BTreeSet<FundingSource>,
}

/// Flag transactions merging owned inputs with disjoint one-hop histories
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        let inputs = graph.input_addresses(txid);
        if inputs.len() < 2 {
            continue;
        }
        let (owned, _) = split_inputs(graph, &inputs);
        if owned.len() < 2 {
            continue;
        }

        let sources: Vec<InputSources> = owned
            .iter()
            .filter_map(|input| {
                let parent = graph.fetch_tx(&input.txid)?;
                let funded_by = parent
                    .inputs
                    .iter()
                    .map(|i| match i.funding {
                        Funding::Coinbase => FundingSource::Coinbase,
                        Funding::Spend { txid, .. } => FundingSource::Tx(txid),
                    })
                    .collect();
                Some(InputSources {
                    txid: input.txid,
                    vout: input.vout,
                    funded_by,
                })
            })
            .collect();

        let merged = sources.iter().enumerate().any(|(i, a)| {
            sources[i + 1..]
                .iter()
                .any(|b| a.funded_by.is_disjoint(&b.funded_by))
        });
        if !merged {
            continue;
        }

        output.finding(Finding::new(
            FindingKind::ClusterMerge,
            Severity::High,
            format!(
                "TX {} merges UTXOs from different funding chains",
                super::short(txid)
            ),
            Details::ClusterMerge {
                txid: *txid,
                sources,
            },
        ));
    }

    output
}
