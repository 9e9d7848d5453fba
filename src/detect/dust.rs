// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Dust
//!
//! Tiny outputs sent to owned addresses can be tracking tokens: spending one together with a
//! normal coin links both. Dust still held is reported per UTXO; dust received in the past and
//! already spent is reported once per `(txid, address)` with a lower severity.

use std::collections::BTreeSet;

use super::{Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;

/// Outputs at or below this value are dust
pub const DUST_SATS: u64 = 1_000;
/// Outputs at or below this value are below the standard relay dust limit
pub const STRICT_DUST_SATS: u64 = 546;

/// Report owned dust, unspent and historical
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();
    let mut unspent = BTreeSet::new();

    for utxo in graph.owned_utxos() {
        if utxo.amount_sats > DUST_SATS {
            continue;
        }
        let address = utxo.address.clone().unwrap_or_default();
        let strict = utxo.amount_sats <= STRICT_DUST_SATS;
        unspent.insert((utxo.txid, address.clone()));

        output.finding(Finding::new(
            FindingKind::Dust,
            if strict {
                Severity::High
            } else {
                Severity::Medium
            },
            format!(
                "Dust UTXO {} = {} sats ({}) from TX {}",
                address,
                utxo.amount_sats,
                if strict { "strict dust" } else { "dust-class" },
                super::short(&utxo.txid)
            ),
            Details::Dust {
                txid: utxo.txid,
                address,
                value_sats: utxo.amount_sats,
                strict,
                spent: false,
            },
        ));
    }

    let mut seen = BTreeSet::new();
    for txid in graph.owned_txids() {
        for out in graph.output_addresses(txid) {
            let address = match out.address {
                Some(address) if graph.is_owned(&address) => address,
                _ => continue,
            };
            if out.value_sats > DUST_SATS {
                continue;
            }

            let key = (*txid, address);
            if unspent.contains(&key) || !seen.insert(key.clone()) {
                continue;
            }
            let (txid, address) = key;

            output.finding(Finding::new(
                FindingKind::Dust,
                Severity::Low,
                format!(
                    "Dust output {} = {} sats was received in TX {} (already spent)",
                    address,
                    out.value_sats,
                    super::short(&txid)
                ),
                Details::Dust {
                    txid,
                    address,
                    value_sats: out.value_sats,
                    strict: out.value_sats <= STRICT_DUST_SATS,
                    spent: true,
                },
            ));
        }
    }

    output
}
