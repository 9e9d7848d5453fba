// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Address reuse
//!
//! An owned address that received in two or more distinct transactions links all of them to the
//! same owner.

use std::collections::BTreeSet;

use super::{Details, DetectorOutput, Finding, FindingKind, Labels, ReuseTx, Severity};
use crate::graph::TxGraph;
use crate::types::Category;

/// Minimum distinct receiving transactions of a reused address
pub const MIN_RECEIVES: usize = 2;

/// Flag every owned address with at least two distinct receiving txids
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for (address, derived) in graph.addresses().iter() {
        let receives: BTreeSet<_> = graph
            .records_of(address)
            .iter()
            .filter(|r| r.category == Category::Receive)
            .map(|r| r.txid)
            .collect();
        if receives.len() < MIN_RECEIVES {
            continue;
        }

        let txids = receives
            .iter()
            .map(|txid| ReuseTx {
                txid: *txid,
                confirmations: graph.fetch_tx(txid).and_then(|tx| tx.confirmations),
            })
            .collect();

        output.finding(Finding::new(
            FindingKind::AddressReuse,
            Severity::High,
            format!(
                "Address {} ({}) used in {} different transactions",
                address,
                derived.keychain.role(),
                receives.len()
            ),
            Details::AddressReuse {
                address: address.clone(),
                keychain: derived.keychain,
                txids,
            },
        ));
    }

    output
}
