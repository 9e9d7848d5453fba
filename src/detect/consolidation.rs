// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! UTXOs born from a consolidation
//!
//! A UTXO created by a many-inputs few-outputs transaction carries the linkage of every merged
//! input: tracing it back a single hop reveals them all.

use super::cioh::{CONSOLIDATION_MAX_OUTPUTS, CONSOLIDATION_MIN_INPUTS};
use super::{split_inputs, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Flag owned UTXOs whose funding transaction has a consolidation shape
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for utxo in graph.owned_utxos() {
        let parent = match graph.fetch_tx(&utxo.txid) {
            Some(parent) => parent,
            None => continue,
        };
        let (inputs, outputs) = (parent.inputs.len(), parent.outputs.len());
        if inputs < CONSOLIDATION_MIN_INPUTS || outputs > CONSOLIDATION_MAX_OUTPUTS {
            continue;
        }

        let resolved = graph.input_addresses(&utxo.txid);
        let (owned, _) = split_inputs(graph, &resolved);

        output.finding(Finding::new(
            FindingKind::ConsolidationOrigin,
            Severity::Medium,
            format!(
                "UTXO {}:{} ({} sats) was born from a consolidation ({} inputs -> {} outputs, {} owned)",
                super::short(&utxo.txid),
                utxo.vout,
                utxo.amount_sats,
                inputs,
                outputs,
                owned.len()
            ),
            Details::ConsolidationOrigin {
                txid: utxo.txid,
                vout: utxo.vout,
                amount_sats: utxo.amount_sats,
                inputs,
                outputs,
                owned_inputs: owned.len(),
            },
        ));
    }

    output
}
