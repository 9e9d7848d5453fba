#![allow(unused)]
use std::collections::{BTreeMap, BTreeSet};

use bitcoin::hashes::Hash;
use bitcoin::{Network, Txid};
use privacy_audit::{
    Category, DecodedTransaction, Funding, ListedDescriptor, MemoryBlockchain, Report,
    ScanRequest, Scanner, ScriptType, TxInput, TxOutput, Utxo, WalletTxRecord,
};

pub const WALLET: &str = "alice";
pub const RECEIVE_DESC: &str = "wpkh(tpubalice/0/*)";
pub const CHANGE_DESC: &str = "wpkh(tpubalice/1/*)";

/// Receive address `index` of the test wallet
pub fn receive(index: u32) -> String {
    format!("bcrt1q-alice-{}", index)
}

/// Change address `index` of the test wallet
pub fn change(index: u32) -> String {
    format!("bcrt1q-alice-change-{}", index)
}

pub fn txid(label: &str) -> Txid {
    Txid::hash(label.as_bytes())
}

fn script_type(address: &str) -> ScriptType {
    if address.starts_with("bcrt1q") {
        ScriptType::P2wpkh
    } else if address.starts_with("bcrt1p") {
        ScriptType::P2tr
    } else {
        ScriptType::Unknown
    }
}

/// A regtest node serving the history of wallet `alice`
pub struct TestChain {
    pub chain: MemoryBlockchain,
    owned: BTreeSet<String>,
    txs: BTreeMap<Txid, DecodedTransaction>,
}

impl TestChain {
    pub fn new() -> Self {
        let mut chain = MemoryBlockchain::new(Network::Regtest);
        let mut owned = BTreeSet::new();

        for (desc, internal, derive) in [
            (RECEIVE_DESC, false, receive as fn(u32) -> String),
            (CHANGE_DESC, true, change as fn(u32) -> String),
        ] {
            let addresses: Vec<_> = (0..20).map(derive).collect();
            owned.extend(addresses.iter().cloned());
            chain.insert_derivation(desc, addresses);
            chain.insert_descriptor(
                WALLET,
                ListedDescriptor {
                    desc: desc.to_string(),
                    internal,
                    active: true,
                    range_end: 999,
                },
            );
        }

        TestChain {
            chain,
            owned,
            txs: BTreeMap::new(),
        }
    }

    pub fn coinbase(&mut self, label: &str, outputs: &[(&str, u64)]) -> Txid {
        self.insert(label, vec![(None, 0xFFFFFFFF)], outputs)
    }

    pub fn tx(&mut self, label: &str, inputs: &[(Txid, u32)], outputs: &[(&str, u64)]) -> Txid {
        let inputs = inputs
            .iter()
            .map(|(txid, vout)| (Some((*txid, *vout)), 0xFFFFFFFD))
            .collect();
        self.insert(label, inputs, outputs)
    }

    fn insert(
        &mut self,
        label: &str,
        inputs: Vec<(Option<(Txid, u32)>, u32)>,
        outputs: &[(&str, u64)],
    ) -> Txid {
        let tx = DecodedTransaction {
            txid: txid(label),
            version: 2,
            locktime: 0,
            vsize: 141,
            confirmations: Some(6),
            inputs: inputs
                .into_iter()
                .map(|(prevout, sequence)| TxInput {
                    funding: match prevout {
                        Some((txid, vout)) => Funding::Spend { txid, vout },
                        None => Funding::Coinbase,
                    },
                    sequence,
                })
                .collect(),
            outputs: outputs
                .iter()
                .enumerate()
                .map(|(n, (address, value))| TxOutput {
                    n: n as u32,
                    value_sats: *value,
                    script_type: script_type(address),
                    address: Some(address.to_string()),
                })
                .collect(),
        };

        let txid = tx.txid;
        self.txs.insert(txid, tx.clone());
        self.chain.insert_tx(tx);
        txid
    }

    /// Report `txid` in the wallet history, like `listtransactions` would
    pub fn seen(&mut self, txid: Txid) -> &mut Self {
        let tx = self.txs[&txid].clone();
        let spends_owned = tx.inputs.iter().any(|i| match i.funding {
            Funding::Spend { txid, vout } => self.txs.get(&txid).map_or(false, |parent| {
                parent.outputs[vout as usize]
                    .address
                    .as_ref()
                    .map_or(false, |a| self.owned.contains(a))
            }),
            Funding::Coinbase => false,
        });

        for output in &tx.outputs {
            let address = output.address.clone().unwrap_or_default();
            let owned = self.owned.contains(&address);
            let category = match (owned, spends_owned) {
                (true, _) => Category::Receive,
                (false, true) => Category::Send,
                (false, false) => continue,
            };
            let amount_sats = if owned {
                output.value_sats as i64
            } else {
                -(output.value_sats as i64)
            };

            self.chain.insert_wallet_tx(
                WALLET,
                WalletTxRecord {
                    txid,
                    address: Some(address),
                    category,
                    amount_sats,
                    confirmations: 6,
                    block_height: Some(200),
                },
            );
        }
        self
    }

    pub fn unspent(&mut self, txid: Txid, vout: u32, confirmations: u32) -> &mut Self {
        let output = self.txs[&txid].outputs[vout as usize].clone();
        self.chain.insert_utxo(
            WALLET,
            Utxo {
                txid,
                vout,
                address: output.address,
                amount_sats: output.value_sats,
                confirmations,
            },
        );
        self
    }

    pub fn transactions(&self) -> usize {
        self.txs.len()
    }

    pub fn txids(&self) -> BTreeSet<Txid> {
        self.txs.keys().cloned().collect()
    }

    pub fn scan(&self) -> Report {
        let request = ScanRequest {
            wallet: Some(WALLET.to_string()),
            ..Default::default()
        };
        Scanner::new(&self.chain).run(&request).unwrap()
    }
}
