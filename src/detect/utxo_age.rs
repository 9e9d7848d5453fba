// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! UTXO age spread
//!
//! A large spread between the oldest and the newest owned UTXO reveals dormancy: aged savings
//! next to fresh withdrawals.

use super::{Details, DetectorOutput, Finding, FindingKind, Labels, Severity, UtxoAge};
use crate::graph::TxGraph;
use crate::types::Utxo;

/// Minimum spread, in blocks, worth reporting
pub const MIN_SPREAD: u32 = 10;
/// Confirmations from which a UTXO counts as dormant
pub const DORMANT_CONFIRMATIONS: u32 = 100;

impl From<&Utxo> for UtxoAge {
    fn from(utxo: &Utxo) -> Self {
        UtxoAge {
            txid: utxo.txid,
            vout: utxo.vout,
            confirmations: utxo.confirmations,
            amount_sats: utxo.amount_sats,
        }
    }
}

/// Report the confirmation spread of the owned UTXOs
///
/// Dormant UTXOs are only reported, as a warning, together with a spread finding.
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    let mut owned = graph.owned_utxos();
    if owned.len() < 2 {
        return output;
    }
    // oldest first, ties keep the wallet order
    owned.sort_by(|a, b| b.confirmations.cmp(&a.confirmations));

    let (oldest, newest) = match (owned.first(), owned.last()) {
        (Some(oldest), Some(newest)) => (*oldest, *newest),
        _ => return output,
    };
    let spread = oldest.confirmations - newest.confirmations;
    if spread < MIN_SPREAD {
        return output;
    }

    output.finding(Finding::new(
        FindingKind::UtxoAgeSpread,
        Severity::Low,
        format!(
            "UTXO age spread: {} blocks between oldest ({} confirmations) and newest ({} confirmations)",
            spread, oldest.confirmations, newest.confirmations
        ),
        Details::UtxoAgeSpread {
            spread,
            oldest: oldest.into(),
            newest: newest.into(),
        },
    ));

    let dormant = owned
        .iter()
        .filter(|u| u.confirmations >= DORMANT_CONFIRMATIONS)
        .count();
    if dormant > 0 {
        output.warning(Finding::new(
            FindingKind::UtxoAgeSpread,
            Severity::Low,
            format!(
                "{} UTXO(s) have at least {} confirmations, a dormant coins pattern",
                dormant, DORMANT_CONFIRMATIONS
            ),
            Details::DormantUtxos {
                count: dormant,
                threshold: DORMANT_CONFIRMATIONS,
            },
        ));
    }

    output
}
