// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Common input ownership heuristic
//!
//! Chain analysis assumes every input of a transaction belongs to the same entity. Spending two
//! or more owned inputs together confirms that assumption for the wallet.

use super::{split_inputs, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Minimum inputs of a consolidation
pub const CONSOLIDATION_MIN_INPUTS: usize = 3;
/// Maximum outputs of a consolidation
pub const CONSOLIDATION_MAX_OUTPUTS: usize = 2;

/// Flag owned transactions spending at least two owned inputs
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        let tx = match graph.fetch_tx(txid) {
            Some(tx) if tx.inputs.len() >= 2 => tx,
            _ => continue,
        };

        let inputs = graph.input_addresses(txid);
        if inputs.len() < 2 {
            continue;
        }
        let (owned, external) = split_inputs(graph, &inputs);
        if owned.len() < 2 {
            continue;
        }

        let total = inputs.len();
        let severity = if owned.len() == total {
            Severity::Critical
        } else {
            Severity::High
        };
        let consolidation_shape =
            total >= CONSOLIDATION_MIN_INPUTS && tx.outputs.len() <= CONSOLIDATION_MAX_OUTPUTS;

        let mut description = format!(
            "TX {} has {} inputs, {} are owned ({:.0}% ownership)",
            super::short(txid),
            total,
            owned.len(),
            owned.len() as f64 / total as f64 * 100.0
        );
        if consolidation_shape {
            description.push_str(&format!(
                "; consolidation shape: {} inputs -> {} outputs",
                total,
                tx.outputs.len()
            ));
        }

        output.finding(Finding::new(
            FindingKind::Cioh,
            severity,
            description,
            Details::Cioh {
                txid: *txid,
                total_inputs: total,
                owned_inputs: owned.len(),
                outputs: tx.outputs.len(),
                consolidation_shape,
                owned: owned.into_iter().cloned().collect(),
                external: external.into_iter().cloned().collect(),
            },
        ));
    }

    output
}
