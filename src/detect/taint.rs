// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Taint propagation
//!
//! Inputs funded by a transaction of a known risky wallet are tainted. Spending them together
//! with clean inputs spreads the taint to every output of the transaction.
//!
//! The detector is disabled unless the caller labels at least one risky wallet, see
//! [`Labels::risky_txids`].

use super::{Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Flag owned spends merging tainted and clean inputs, and warn on direct risky receipts
pub fn detect(graph: &TxGraph<'_>, labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    let risky = match &labels.risky_txids {
        Some(risky) => risky,
        None => return output,
    };

    for txid in graph.owned_txids() {
        let inputs = graph.input_addresses(txid);
        if inputs.len() < 2 {
            continue;
        }
        if !inputs.iter().any(|i| graph.owns(i.address.as_deref())) {
            continue;
        }

        let (tainted, clean): (Vec<_>, Vec<_>) =
            inputs.into_iter().partition(|i| risky.contains(&i.txid));
        if tainted.is_empty() || clean.is_empty() {
            continue;
        }

        output.finding(Finding::new(
            FindingKind::Taint,
            Severity::High,
            format!(
                "TX {} merges {} tainted input(s) with {} clean input(s)",
                super::short(txid),
                tainted.len(),
                clean.len()
            ),
            Details::Taint {
                txid: *txid,
                tainted,
                clean,
            },
        ));
    }

    for txid in graph.owned_txids().intersection(risky) {
        let received: Vec<_> = graph
            .output_addresses(txid)
            .into_iter()
            .filter(|o| graph.owns(o.address.as_deref()))
            .collect();
        if received.is_empty() {
            continue;
        }

        output.warning(Finding::new(
            FindingKind::Taint,
            Severity::Medium,
            format!(
                "TX {} comes straight from a known risky wallet",
                super::short(txid)
            ),
            Details::DirectTaint {
                txid: *txid,
                received,
            },
        ));
    }

    output
}
