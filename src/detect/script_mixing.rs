// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Script type mixing in inputs

use std::collections::BTreeSet;

use super::{Details, DetectorOutput, Finding, FindingKind, Labels, Severity, TypedInput};
use crate::graph::TxGraph;

/// Flag transactions with two owned inputs and two known script types among all the inputs
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    for txid in graph.owned_txids() {
        let inputs = graph.input_addresses(txid);
        if inputs.len() < 2 {
            continue;
        }

        let typed: Vec<_> = inputs
            .into_iter()
            .map(|input| TypedInput {
                script_type: graph.script_type_of(input.address.as_deref()),
                owned: graph.owns(input.address.as_deref()),
                input,
            })
            .collect();
        if typed.iter().filter(|t| t.owned).count() < 2 {
            continue;
        }

        let script_types: BTreeSet<_> = typed
            .iter()
            .map(|t| t.script_type)
            .filter(|s| s.is_known())
            .collect();
        if script_types.len() < 2 {
            continue;
        }

        let names: Vec<_> = script_types.iter().map(|s| s.to_string()).collect();
        output.finding(Finding::new(
            FindingKind::ScriptTypeMixing,
            Severity::High,
            format!(
                "TX {} mixes input script types: {}",
                super::short(txid),
                names.join(", ")
            ),
            Details::ScriptTypeMixing {
                txid: *txid,
                script_types: script_types.into_iter().collect(),
                inputs: typed,
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
    use crate::types::{KeychainKind, ScriptType};

    #[test]
    fn test_mixed_owned_types() {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        fx.receive_address("bcrt1p-alice-0");
        let a = fx.coinbase("a", &[("bcrt1q-alice-0", 10_000), ("bcrt1p-alice-0", 10_000)]);
        let spend = fx.tx("spend", &[(a, 0), (a, 1)], &[("bcrt1q-bob", 19_000)]);
        fx.touch(spend);

        let output = detect(&fx.graph(), &Labels::default());
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].severity, Severity::High);
        assert_matches!(
            &output.findings[0].details,
            Details::ScriptTypeMixing { script_types, inputs, .. }
                if script_types == &vec![ScriptType::P2wpkh, ScriptType::P2tr]
                    && inputs.iter().all(|i| i.owned)
        );
    }

    #[test]
    fn test_external_input_counts_for_types() {
        let mut fx = Fixture::new();
        fx.own("mlegacy-alice-0", ScriptType::P2pkh, KeychainKind::External);
        fx.own("mlegacy-alice-1", ScriptType::P2pkh, KeychainKind::External);
        let a = fx.coinbase(
            "a",
            &[
                ("mlegacy-alice-0", 10_000),
                ("mlegacy-alice-1", 10_000),
                ("2N-carol", 10_000),
                ("mcarol", 10_000),
            ],
        );
        let spend = fx.tx("spend", &[(a, 0), (a, 1), (a, 2), (a, 3)], &[("bcrt1q-bob", 39_000)]);
        fx.touch(spend);

        let output = detect(&fx.graph(), &Labels::default());
        assert_eq!(output.findings.len(), 1);
        // the unknown external type is left out
        assert_matches!(
            &output.findings[0].details,
            Details::ScriptTypeMixing { script_types, inputs, .. }
                if script_types == &vec![ScriptType::P2shP2wpkh, ScriptType::P2pkh]
                    && inputs.len() == 4
        );
    }

    #[test]
    fn test_single_type() {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        fx.receive_address("bcrt1q-alice-1");
        let a = fx.coinbase("a", &[("bcrt1q-alice-0", 10_000), ("bcrt1q-alice-1", 10_000)]);
        let spend = fx.tx("spend", &[(a, 0), (a, 1)], &[("bcrt1p-bob", 19_000)]);
        fx.touch(spend);

        assert!(detect(&fx.graph(), &Labels::default()).findings.is_empty());
    }
}
