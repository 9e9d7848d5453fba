// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Change detection
//!
//! In a send with both owned and external outputs, the owned ones are change. The change is
//! identifiable to an observer when:
//!
//! * the payment is a round amount and the change isn't
//! * the change has the script type of the spent inputs while the payment has another one
//! * the change sits on the internal derivation branch
//!
//! Every matching reason is reported once, in the order it was found.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::{is_round, split_inputs, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;
use crate::types::{KeychainKind, ScriptType};

/// Why a change output is identifiable
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ChangeReason {
    /// Round payment next to a non-round change
    RoundPayment {
        /// Payment value
        payment_sats: u64,
        /// Change value
        change_sats: u64,
    },
    /// Change script type matches the inputs and differs from the payment
    ScriptTypeMatch {
        /// Script type of the change
        change: ScriptType,
        /// Script type of the payment
        payment: ScriptType,
    },
    /// Change on the internal branch
    InternalBranch,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::RoundPayment {
                payment_sats,
                change_sats,
            } => write!(
                f,
                "round payment ({} sats) vs non-round change ({} sats)",
                payment_sats, change_sats
            ),
            ChangeReason::ScriptTypeMatch { change, payment } => write!(
                f,
                "change script type ({}) matches the inputs, payment is {}",
                change, payment
            ),
            ChangeReason::InternalBranch => write!(f, "change uses the internal derivation branch"),
        }
    }
}

/// Flag sends whose change output can be told apart from the payment
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        if graph.fetch_tx(txid).is_none() {
            continue;
        }
        let outputs = graph.output_addresses(txid);
        if outputs.len() < 2 {
            continue;
        }

        let inputs = graph.input_addresses(txid);
        let (owned_in, _) = split_inputs(graph, &inputs);
        if owned_in.is_empty() {
            continue;
        }

        let (change, payments): (Vec<_>, Vec<_>) = outputs
            .into_iter()
            .partition(|o| graph.owns(o.address.as_deref()));
        if change.is_empty() || payments.is_empty() {
            continue;
        }

        let input_types: BTreeSet<ScriptType> = owned_in
            .iter()
            .map(|i| graph.script_type_of(i.address.as_deref()))
            .collect();

        let mut reasons: Vec<ChangeReason> = Vec::new();
        let mut push = |reason: ChangeReason| {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        };
        for ch in &change {
            let change_type = graph.script_type_of(ch.address.as_deref());
            let internal =
                graph.keychain_of(ch.address.as_deref()) == Some(KeychainKind::Internal);

            for payment in &payments {
                if is_round(payment.value_sats) && !is_round(ch.value_sats) {
                    push(ChangeReason::RoundPayment {
                        payment_sats: payment.value_sats,
                        change_sats: ch.value_sats,
                    });
                }
                if input_types.contains(&change_type) && ch.script_type != payment.script_type {
                    push(ChangeReason::ScriptTypeMatch {
                        change: ch.script_type,
                        payment: payment.script_type,
                    });
                }
                if internal {
                    push(ChangeReason::InternalBranch);
                }
            }
        }
        if reasons.is_empty() {
            continue;
        }

        let listed: Vec<_> = reasons.iter().map(ChangeReason::to_string).collect();
        output.finding(Finding::new(
            FindingKind::ChangeDetection,
            Severity::Medium,
            format!(
                "TX {} has identifiable change output(s): {}",
                super::short(txid),
                listed.join("; ")
            ),
            Details::ChangeDetection {
                txid: *txid,
                reasons,
                change,
            },
        ));
    }

    output
}
