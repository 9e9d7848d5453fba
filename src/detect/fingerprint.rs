// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Behavioral fingerprint
//!
//! Wallet software leaves consistent traces across the transactions it builds: how many outputs,
//! which script types, whether it signals RBF or sets an anti-fee-sniping locktime, how it picks
//! fee rates. Each consistent trait across the owned sends is reported as a separate finding.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::{is_round, Details, DetectorOutput, Finding, FindingKind, Labels, Severity};
use crate::graph::TxGraph;
use crate::types::ScriptType;

/// Sends required before looking for patterns
pub const MIN_SENDS: usize = 3;
/// Share of round payments that stands out
pub const ROUND_RATIO: f64 = 0.6;
/// Coefficient of variation under which fee rates look fixed
pub const FEE_RATE_CV: f64 = 0.15;

/// A trait shared by the owned sends
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "pattern")]
pub enum FingerprintPattern {
    /// Most payments are round amounts
    RoundAmounts {
        /// Round payments over all payments
        ratio: f64,
    },
    /// Every send has the same number of outputs
    UniformOutputCount {
        /// Outputs per send
        outputs: usize,
    },
    /// Owned inputs of different script types across the sends
    MixedInputTypes {
        /// Script types of the owned inputs
        types: BTreeSet<ScriptType>,
    },
    /// Every owned input is legacy P2PKH
    LegacyInputsOnly,
    /// Every input signals RBF
    RbfAlwaysOn,
    /// No input signals RBF
    RbfAlwaysOff,
    /// Every send sets a locktime
    LocktimeAlwaysSet,
    /// No send sets a locktime
    LocktimeAlwaysZero,
    /// Fee rates barely vary
    ConsistentFeeRate {
        /// Mean fee rate in sat/vbyte
        mean: f64,
        /// Population standard deviation
        std_dev: f64,
        /// Coefficient of variation
        cv: f64,
    },
    /// Change and payments never share a script type
    DisjointChangeTypes {
        /// Script types of the change outputs
        change: BTreeSet<ScriptType>,
        /// Script types of the payment outputs
        payment: BTreeSet<ScriptType>,
    },
    /// Every send spends the same number of inputs, more than one
    ConstantInputCount {
        /// Inputs per send
        inputs: usize,
    },
}

impl fmt::Display for FingerprintPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintPattern::RoundAmounts { ratio } => {
                write!(f, "{:.0}% of payments are round amounts", ratio * 100.0)
            }
            FingerprintPattern::UniformOutputCount { outputs } => {
                write!(f, "every send has exactly {} outputs", outputs)
            }
            FingerprintPattern::MixedInputTypes { types } => {
                let names: Vec<_> = types.iter().map(ScriptType::to_string).collect();
                write!(f, "mixed input script types across sends: {}", names.join(", "))
            }
            FingerprintPattern::LegacyInputsOnly => write!(f, "all inputs use legacy P2PKH"),
            FingerprintPattern::RbfAlwaysOn => write!(f, "every input signals RBF"),
            FingerprintPattern::RbfAlwaysOff => write!(f, "no input signals RBF"),
            FingerprintPattern::LocktimeAlwaysSet => {
                write!(f, "anti-fee-sniping locktime always set")
            }
            FingerprintPattern::LocktimeAlwaysZero => write!(f, "locktime always 0"),
            FingerprintPattern::ConsistentFeeRate { mean, std_dev, cv } => write!(
                f,
                "consistent fee rate: {:.1} sat/vB +/- {:.1} (cv {:.2})",
                mean, std_dev, cv
            ),
            FingerprintPattern::DisjointChangeTypes { .. } => {
                write!(f, "change never shares the script type of the payments")
            }
            FingerprintPattern::ConstantInputCount { inputs } => {
                write!(f, "every send spends exactly {} inputs", inputs)
            }
        }
    }
}

/// Features collected over the owned sends
#[derive(Debug, Default)]
struct Features {
    output_counts: Vec<usize>,
    input_counts: Vec<usize>,
    payments: usize,
    round_payments: usize,
    input_types: BTreeSet<ScriptType>,
    rbf: Vec<bool>,
    locktimes: Vec<u32>,
    fee_rates: Vec<f64>,
    change_types: BTreeSet<ScriptType>,
    payment_types: BTreeSet<ScriptType>,
}

impl Features {
    fn patterns(&self) -> Vec<FingerprintPattern> {
        let mut patterns = Vec::new();

        if self.payments > 0 {
            let ratio = self.round_payments as f64 / self.payments as f64;
            if ratio > ROUND_RATIO {
                patterns.push(FingerprintPattern::RoundAmounts { ratio });
            }
        }

        if let Some(outputs) = constant(&self.output_counts) {
            patterns.push(FingerprintPattern::UniformOutputCount { outputs });
        }

        if self.input_types.len() > 1 {
            patterns.push(FingerprintPattern::MixedInputTypes {
                types: self.input_types.clone(),
            });
        } else if self.input_types.contains(&ScriptType::P2pkh) {
            patterns.push(FingerprintPattern::LegacyInputsOnly);
        }

        if !self.rbf.is_empty() {
            if self.rbf.iter().all(|r| *r) {
                patterns.push(FingerprintPattern::RbfAlwaysOn);
            } else if self.rbf.iter().all(|r| !*r) {
                patterns.push(FingerprintPattern::RbfAlwaysOff);
            }
        }

        if self.locktimes.len() >= MIN_SENDS {
            if self.locktimes.iter().all(|l| *l > 0) {
                patterns.push(FingerprintPattern::LocktimeAlwaysSet);
            } else if self.locktimes.iter().all(|l| *l == 0) {
                patterns.push(FingerprintPattern::LocktimeAlwaysZero);
            }
        }

        if self.fee_rates.len() >= MIN_SENDS {
            let n = self.fee_rates.len() as f64;
            let mean = self.fee_rates.iter().sum::<f64>() / n;
            if mean > 0.0 {
                let variance = self
                    .fee_rates
                    .iter()
                    .map(|r| (r - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std_dev = variance.sqrt();
                let cv = std_dev / mean;
                if cv < FEE_RATE_CV {
                    patterns.push(FingerprintPattern::ConsistentFeeRate { mean, std_dev, cv });
                }
            }
        }

        if !self.change_types.is_empty()
            && !self.payment_types.is_empty()
            && self.change_types.is_disjoint(&self.payment_types)
        {
            patterns.push(FingerprintPattern::DisjointChangeTypes {
                change: self.change_types.clone(),
                payment: self.payment_types.clone(),
            });
        }

        match constant(&self.input_counts) {
            Some(inputs) if inputs > 1 => {
                patterns.push(FingerprintPattern::ConstantInputCount { inputs })
            }
            _ => {}
        }

        patterns
    }
}

/// The shared value of at least [`MIN_SENDS`] equal counts
fn constant(counts: &[usize]) -> Option<usize> {
    let first = *counts.first()?;
    if counts.len() >= MIN_SENDS && counts.iter().all(|c| *c == first) {
        Some(first)
    } else {
        None
    }
}

/// Look for consistent traits across the transactions spending owned coins
pub fn detect(graph: &TxGraph<'_>, _labels: &Labels) -> DetectorOutput {
    let mut output = DetectorOutput::default();

    let sends: Vec<_> = graph
        .owned_txids()
        .iter()
        .filter_map(|txid| {
            let inputs = graph.input_addresses(txid);
            if inputs.iter().any(|i| graph.owns(i.address.as_deref())) {
                Some((*txid, inputs))
            } else {
                None
            }
        })
        .collect();
    if sends.len() < MIN_SENDS {
        return output;
    }

    let mut features = Features::default();
    for (txid, inputs) in &sends {
        let tx = match graph.fetch_tx(txid) {
            Some(tx) => tx,
            None => continue,
        };

        features.input_counts.push(tx.inputs.len());
        features.output_counts.push(tx.outputs.len());
        features.locktimes.push(tx.locktime);
        features
            .rbf
            .extend(tx.inputs.iter().map(|i| i.signals_rbf()));

        features.input_types.extend(
            inputs
                .iter()
                .filter(|i| graph.owns(i.address.as_deref()))
                .map(|i| graph.script_type_of(i.address.as_deref())),
        );

        for out in &tx.outputs {
            if graph.owns(out.address.as_deref()) {
                features.change_types.insert(out.script_type);
            } else {
                features.payment_types.insert(out.script_type);
                features.payments += 1;
                if is_round(out.value_sats) {
                    features.round_payments += 1;
                }
            }
        }

        let input_total: u64 = inputs.iter().map(|i| i.value_sats).sum();
        let fee = input_total.saturating_sub(tx.output_total());
        if fee > 0 && tx.vsize > 0 {
            features.fee_rates.push(fee as f64 / tx.vsize as f64);
        }
    }

    for pattern in features.patterns() {
        output.finding(Finding::new(
            FindingKind::BehavioralFingerprint,
            Severity::Medium,
            format!(
                "Behavioral fingerprint across {} send transactions: {}",
                sends.len(),
                pattern
            ),
            Details::BehavioralFingerprint {
                send_transactions: sends.len(),
                pattern,
            },
        ));
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::Fixture;

    fn patterns(output: &DetectorOutput) -> Vec<FingerprintPattern> {
        output
            .findings
            .iter()
            .filter_map(|f| match &f.details {
                Details::BehavioralFingerprint { pattern, .. } => Some(pattern.clone()),
                _ => None,
            })
            .collect()
    }

    /// A chain of sends, each spending the change of the previous one
    fn sends(outputs_per_send: &[usize]) -> Fixture {
        let mut fx = Fixture::new();
        fx.receive_address("bcrt1q-alice-0");
        let mut prev = fx.coinbase("funding", &[("bcrt1q-alice-0", 10_000_000)]);
        let mut value = 10_000_000;

        for (i, n) in outputs_per_send.iter().enumerate() {
            let change = format!("bcrt1q-alice-change-{}", i);
            fx.change_address(&change);
            value -= 1_000_000 + 1_410;
            let payees: Vec<_> = (1..*n).map(|p| format!("bcrt1q-payee-{}-{}", i, p)).collect();

            let mut outputs = vec![(change.as_str(), value)];
            outputs.extend(payees.iter().map(|p| (p.as_str(), 1_000_000 / (*n as u64 - 1))));
            let txid = fx.tx(&format!("send-{}", i), &[(prev, 0)], &outputs);
            fx.touch(txid);
            prev = txid;
        }
        fx
    }

    #[test]
    fn test_uniform_output_count() {
        let fx = sends(&[2, 2, 2, 2, 2]);
        let output = detect(&fx.graph(), &Labels::default());
        let found = patterns(&output);

        assert!(found.contains(&FingerprintPattern::UniformOutputCount { outputs: 2 }));
        assert!(found.contains(&FingerprintPattern::RoundAmounts { ratio: 1.0 }));
        assert!(found.contains(&FingerprintPattern::RbfAlwaysOn));
        assert!(found.contains(&FingerprintPattern::LocktimeAlwaysZero));
        assert!(output
            .findings
            .iter()
            .all(|f| f.severity == Severity::Medium && f.kind == FindingKind::BehavioralFingerprint));
        // single input sends aren't distinctive
        assert!(!found
            .iter()
            .any(|p| matches!(p, FingerprintPattern::ConstantInputCount { .. })));
    }

    #[test]
    fn test_varying_output_count() {
        let fx = sends(&[2, 3, 2, 5]);
        let found = patterns(&detect(&fx.graph(), &Labels::default()));
        assert!(!found
            .iter()
            .any(|p| matches!(p, FingerprintPattern::UniformOutputCount { .. })));
    }

    #[test]
    fn test_consistent_fee_rate() {
        // about 1410 sats over 141 vbytes for every send
        let fx = sends(&[2, 3, 4]);
        let found = patterns(&detect(&fx.graph(), &Labels::default()));
        assert!(found.iter().any(|p| matches!(
            p,
            FingerprintPattern::ConsistentFeeRate { mean, cv, .. } if *cv < 0.01 && (*mean - 10.0).abs() < 0.1
        )));
    }

    #[test]
    fn test_mixed_input_types() {
        let mut fx = Fixture::new();
        let mut funding_outputs = Vec::new();
        for i in 0..3 {
            funding_outputs.push((format!("bcrt1q-alice-{}", i), 400_000));
            funding_outputs.push((format!("bcrt1p-alice-{}", i), 600_000));
        }
        for (address, _) in &funding_outputs {
            fx.receive_address(address);
        }
        let funding_outputs: Vec<_> = funding_outputs
            .iter()
            .map(|(a, v)| (a.as_str(), *v))
            .collect();
        let funding = fx.coinbase("funding", &funding_outputs);

        // every send merges a segwit v0 and a taproot coin
        for i in 0..3u32 {
            let payee = format!("bcrt1q-payee-{}", i);
            let txid = fx.tx(
                &format!("send-{}", i),
                &[(funding, 2 * i), (funding, 2 * i + 1)],
                &[(payee.as_str(), 990_000)],
            );
            fx.touch(txid);
        }

        let found = patterns(&detect(&fx.graph(), &Labels::default()));
        assert!(found.contains(&FingerprintPattern::MixedInputTypes {
            types: vec![ScriptType::P2wpkh, ScriptType::P2tr]
                .into_iter()
                .collect(),
        }));
        assert!(found.contains(&FingerprintPattern::ConstantInputCount { inputs: 2 }));
        assert!(!found.contains(&FingerprintPattern::LegacyInputsOnly));
    }

    #[test]
    fn test_not_enough_sends() {
        let fx = sends(&[2, 2]);
        assert!(detect(&fx.graph(), &Labels::default()).findings.is_empty());
    }

    #[test]
    fn test_features() {
        let features = Features {
            input_types: vec![ScriptType::P2pkh].into_iter().collect(),
            rbf: vec![false, false],
            locktimes: vec![700_000, 700_001, 700_002],
            input_counts: vec![2, 2, 2],
            change_types: vec![ScriptType::P2tr].into_iter().collect(),
            payment_types: vec![ScriptType::P2wpkh].into_iter().collect(),
            ..Default::default()
        };

        assert_eq!(
            features.patterns(),
            vec![
                FingerprintPattern::LegacyInputsOnly,
                FingerprintPattern::RbfAlwaysOff,
                FingerprintPattern::LocktimeAlwaysSet,
                FingerprintPattern::DisjointChangeTypes {
                    change: vec![ScriptType::P2tr].into_iter().collect(),
                    payment: vec![ScriptType::P2wpkh].into_iter().collect(),
                },
                FingerprintPattern::ConstantInputCount { inputs: 2 },
            ]
        );
    }
}
