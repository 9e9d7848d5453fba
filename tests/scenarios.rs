mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use privacy_audit::detect::{ChangeReason, FingerprintPattern};
use privacy_audit::{Details, FindingKind, Report, Severity};

use common::*;

fn of_kind(report: &Report, kind: FindingKind) -> Vec<&privacy_audit::Finding> {
    report.findings.iter().filter(|f| f.kind == kind).collect()
}

/// A chain of `outputs_per_send.len()` payments, each spending the change of the previous one
fn payments(chain: &mut TestChain, outputs_per_send: &[usize]) {
    let faucet = chain.coinbase("faucet", &[("bcrt1q-faucet", 100_000_000)]);
    let deposit = chain.tx("deposit", &[(faucet, 0)], &[(receive(0).as_str(), 50_000_000)]);
    chain.seen(deposit);

    let mut prev = deposit;
    let mut value = 50_000_000;
    for (i, n) in outputs_per_send.iter().enumerate() {
        value -= 2_000_000 + 1_410;
        let change = change(i as u32);
        let payees: Vec<_> = (1..*n).map(|p| format!("bcrt1q-shop-{}-{}", i, p)).collect();

        let mut outputs = vec![(change.as_str(), value)];
        outputs.extend(
            payees
                .iter()
                .map(|p| (p.as_str(), 2_000_000 / (*n as u64 - 1))),
        );
        let send = chain.tx(&format!("send-{}", i), &[(prev, 0)], &outputs);
        chain.seen(send);
        prev = send;
    }
}

#[test]
fn test_address_reuse() {
    let _ = env_logger::try_init();
    let mut chain = TestChain::new();
    let bob = chain.coinbase("bob", &[("bcrt1q-bob", 10_000_000)]);
    let first = chain.tx(
        "first",
        &[(bob, 0)],
        &[(receive(0).as_str(), 1_000_000), ("bcrt1q-bob-change", 8_990_000)],
    );
    let second = chain.tx(
        "second",
        &[(first, 1)],
        &[(receive(0).as_str(), 2_000_000), ("bcrt1q-bob-change", 6_980_000)],
    );
    chain.seen(first).seen(second);

    let report = chain.scan();
    let reuse = of_kind(&report, FindingKind::AddressReuse);
    assert_eq!(reuse.len(), 1);
    assert_eq!(reuse[0].severity, Severity::High);
    assert_matches!(
        &reuse[0].details,
        Details::AddressReuse { address, txids, .. }
            if address == &receive(0)
                && txids.len() == 2
                && txids.iter().any(|t| t.txid == first)
                && txids.iter().any(|t| t.txid == second)
    );
}

#[test]
fn test_consolidation_is_critical_cioh() {
    let mut chain = TestChain::new();
    let bob = chain.coinbase("bob", &[("bcrt1q-bob", 10_000_000)]);
    let outputs: Vec<_> = (0..5).map(|i| (receive(i), 1_000_000)).collect();
    let outputs: Vec<_> = outputs.iter().map(|(a, v)| (a.as_str(), *v)).collect();
    let funding = chain.tx("funding", &[(bob, 0)], &outputs);
    let inputs: Vec<_> = (0..5).map(|vout| (funding, vout)).collect();
    let merge = chain.tx("merge", &inputs, &[("bcrt1q-carol", 4_990_000)]);
    chain.seen(funding).seen(merge);

    let report = chain.scan();
    let cioh = of_kind(&report, FindingKind::Cioh);
    assert_eq!(cioh.len(), 1);
    assert_eq!(cioh[0].severity, Severity::Critical);
    assert_matches!(
        &cioh[0].details,
        Details::Cioh {
            txid,
            total_inputs: 5,
            owned_inputs: 5,
            outputs: 1,
            consolidation_shape: true,
            ..
        } if *txid == merge
    );
}

#[test]
fn test_strict_dust() {
    let mut chain = TestChain::new();
    let bob = chain.coinbase("bob", &[("bcrt1q-bob", 10_000_000)]);
    let dust = chain.tx(
        "dust",
        &[(bob, 0)],
        &[(receive(3).as_str(), 546), ("bcrt1q-bob", 9_990_000)],
    );
    chain.seen(dust).unspent(dust, 0, 2);

    let report = chain.scan();
    let found = of_kind(&report, FindingKind::Dust);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::High);
    assert_matches!(
        &found[0].details,
        Details::Dust { value_sats: 546, strict: true, spent: false, .. }
    );
}

#[test]
fn test_round_payment_with_internal_change() {
    let mut chain = TestChain::new();
    let bob = chain.coinbase("bob", &[("bcrt1q-bob", 20_000_000)]);
    let deposit = chain.tx("deposit", &[(bob, 0)], &[(receive(0).as_str(), 10_000_000)]);
    let pay = chain.tx(
        "pay",
        &[(deposit, 0)],
        &[("bcrt1q-shop", 5_000_000), (change(0).as_str(), 4_998_231)],
    );
    chain.seen(deposit).seen(pay);

    let report = chain.scan();
    let found = of_kind(&report, FindingKind::ChangeDetection);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Medium);
    assert_matches!(
        &found[0].details,
        Details::ChangeDetection { txid, reasons, .. }
            if *txid == pay
                && reasons.iter().any(|r| matches!(r, ChangeReason::RoundPayment { .. }))
                && reasons.contains(&ChangeReason::InternalBranch)
    );
}

#[test]
fn test_uniform_output_count() {
    let mut chain = TestChain::new();
    payments(&mut chain, &[2, 2, 2, 2, 2]);

    let report = chain.scan();
    let patterns: Vec<_> = of_kind(&report, FindingKind::BehavioralFingerprint)
        .into_iter()
        .filter_map(|f| match &f.details {
            Details::BehavioralFingerprint {
                send_transactions,
                pattern,
            } => {
                assert_eq!(*send_transactions, 5);
                Some(pattern.clone())
            }
            _ => None,
        })
        .collect();
    assert!(patterns.contains(&FingerprintPattern::UniformOutputCount { outputs: 2 }));
}

#[test]
fn test_varying_output_count() {
    let mut chain = TestChain::new();
    payments(&mut chain, &[2, 3, 5, 2]);

    let report = chain.scan();
    assert!(!of_kind(&report, FindingKind::BehavioralFingerprint)
        .iter()
        .any(|f| matches!(
            f.details,
            Details::BehavioralFingerprint {
                pattern: FingerprintPattern::UniformOutputCount { .. },
                ..
            }
        )));
}

#[test]
fn test_idempotent_scan() {
    let mut chain = TestChain::new();
    payments(&mut chain, &[2, 3, 2]);
    let bob = chain.coinbase("bob", &[("bcrt1q-bob", 10_000_000)]);
    let dust = chain.tx("dust", &[(bob, 0)], &[(receive(0).as_str(), 700)]);
    chain.seen(dust).unspent(dust, 0, 150).unspent(txid("send-2"), 0, 1);

    let first = chain.scan();
    let second = chain.scan();
    assert!(!first.findings.is_empty());
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_each_transaction_decoded_once() {
    let mut chain = TestChain::new();
    payments(&mut chain, &[2, 2, 3, 2]);

    chain.scan();
    // the history and the parents of its inputs, each one exactly once
    let calls = chain.chain.get_tx_calls_by_txid();
    assert_eq!(calls.keys().cloned().collect::<BTreeSet<_>>(), chain.txids());
    assert!(calls.values().all(|count| *count == 1));
    assert_eq!(chain.chain.get_tx_calls(), chain.transactions());
}

#[test]
fn test_clean_wallet() {
    let chain = TestChain::new();

    let report = chain.scan();
    assert!(report.is_clean());
    assert_eq!(report.stats.descriptors, 2);
    assert_eq!(report.stats.addresses_derived, 40);
    assert_eq!(report.stats.transactions_analyzed, 0);
}
