// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Dust spent together with normal inputs

use super::dust::DUST_SATS;
use super::{Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Inputs above this value are clearly not dust
pub const NORMAL_SATS: u64 = 10_000;

/// Flag transactions whose owned inputs mix dust with a normal coin
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        let inputs = graph.input_addresses(txid);
        if inputs.len() < 2 {
            continue;
        }

        let owned = inputs
            .into_iter()
            .filter(|i| graph.owns(i.address.as_deref()));
        let (dust, normal): (Vec<_>, Vec<_>) = owned
            .filter(|i| i.value_sats <= DUST_SATS || i.value_sats > NORMAL_SATS)
            .partition(|i| i.value_sats <= DUST_SATS);
        if dust.is_empty() || normal.is_empty() {
            continue;
        }

        output.finding(Finding::new(
            FindingKind::DustSpending,
            Severity::High,
            format!(
                "TX {} spends {} dust input(s) alongside {} normal input(s)",
                super::short(txid),
                dust.len(),
                normal.len()
            ),
            Details::DustSpending {
                txid: *txid,
                dust,
                normal,
            },
        ));
    }

    output
}
