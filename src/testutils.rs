// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Fixture builder for the unit tests

use std::collections::BTreeMap;

use bitcoin::hashes::Hash;
use bitcoin::{Network, Txid};

use crate::blockchain::MemoryBlockchain;
use crate::descriptor::{AddressMap, DerivedAddress};
use crate::graph::{TxCache, TxGraph};
use crate::types::*;

/// Deterministic txid for a label
pub(crate) fn txid(label: &str) -> Txid {
    Txid::hash(label.as_bytes())
}

/// Build a decoded output, typing it from the address encoding
pub(crate) fn output(n: u32, address: &str, value_sats: u64) -> TxOutput {
    TxOutput {
        n,
        value_sats,
        script_type: ScriptType::from_address_prefix(address),
        address: if address.is_empty() {
            None
        } else {
            Some(address.to_string())
        },
    }
}

/// A wallet under construction: backend, owned addresses, history and UTXOs
#[derive(Debug)]
pub(crate) struct Fixture {
    pub chain: MemoryBlockchain,
    pub addresses: AddressMap,
    pub history: Vec<WalletTxRecord>,
    pub utxos: Vec<Utxo>,
    txs: BTreeMap<Txid, DecodedTransaction>,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            chain: MemoryBlockchain::new(Network::Regtest),
            addresses: AddressMap::new(),
            history: Vec::new(),
            utxos: Vec::new(),
            txs: BTreeMap::new(),
        }
    }

    pub fn own(
        &mut self,
        address: &str,
        script_type: ScriptType,
        keychain: KeychainKind,
    ) -> &mut Self {
        let index = self.addresses.len() as u32;
        self.addresses.insert(
            address.to_string(),
            DerivedAddress {
                script_type,
                keychain,
                index,
            },
        );
        self
    }

    pub fn receive_address(&mut self, address: &str) -> &mut Self {
        self.own(
            address,
            ScriptType::from_address_prefix(address),
            KeychainKind::External,
        )
    }

    pub fn change_address(&mut self, address: &str) -> &mut Self {
        self.own(
            address,
            ScriptType::from_address_prefix(address),
            KeychainKind::Internal,
        )
    }

    /// Transaction minting `outputs`
    pub fn coinbase(&mut self, label: &str, outputs: &[(&str, u64)]) -> Txid {
        self.tx_with(label, &[], outputs, |tx| {
            tx.inputs.push(TxInput {
                funding: Funding::Coinbase,
                sequence: 0xFFFFFFFF,
            })
        })
    }

    /// Version 2 transaction signaling RBF, with locktime 0 and 141 vbytes
    pub fn tx(&mut self, label: &str, inputs: &[(Txid, u32)], outputs: &[(&str, u64)]) -> Txid {
        self.tx_with(label, inputs, outputs, |_| {})
    }

    pub fn tx_with<F: FnOnce(&mut DecodedTransaction)>(
        &mut self,
        label: &str,
        inputs: &[(Txid, u32)],
        outputs: &[(&str, u64)],
        edit: F,
    ) -> Txid {
        let mut tx = DecodedTransaction {
            txid: txid(label),
            version: 2,
            locktime: 0,
            vsize: 141,
            confirmations: Some(1),
            inputs: inputs
                .iter()
                .map(|(txid, vout)| TxInput {
                    funding: Funding::Spend {
                        txid: *txid,
                        vout: *vout,
                    },
                    sequence: 0xFFFFFFFD,
                })
                .collect(),
            outputs: outputs
                .iter()
                .enumerate()
                .map(|(n, (address, value))| output(n as u32, address, *value))
                .collect(),
        };
        edit(&mut tx);

        let txid = tx.txid;
        self.txs.insert(txid, tx.clone());
        self.chain.insert_tx(tx);
        txid
    }

    pub fn record(
        &mut self,
        txid: Txid,
        address: &str,
        category: Category,
        amount_sats: i64,
    ) -> &mut Self {
        self.history.push(WalletTxRecord {
            txid,
            address: Some(address.to_string()),
            category,
            amount_sats,
            confirmations: 1,
            block_height: Some(100),
        });
        self
    }

    /// Report `txid` in the history: one receive per owned output, or a single send
    pub fn touch(&mut self, txid: Txid) -> &mut Self {
        let outputs = self
            .txs
            .get(&txid)
            .map(|tx| tx.outputs.clone())
            .unwrap_or_default();
        let owned: Vec<_> = outputs
            .iter()
            .filter(|o| o.address.as_deref().map_or(false, |a| self.addresses.contains(a)))
            .collect();

        if owned.is_empty() {
            let address = outputs
                .first()
                .and_then(|o| o.address.clone())
                .unwrap_or_default();
            let amount = outputs.first().map_or(0, |o| o.value_sats as i64);
            return self.record(txid, &address, Category::Send, -amount);
        }

        let records: Vec<_> = owned
            .into_iter()
            .map(|o| (o.address.clone().unwrap_or_default(), o.value_sats as i64))
            .collect();
        for (address, amount) in records {
            self.record(txid, &address, Category::Receive, amount);
        }
        self
    }

    /// Mark output `vout` of `txid` as unspent
    pub fn utxo(&mut self, txid: Txid, vout: u32, confirmations: u32) -> &mut Self {
        let output = self
            .txs
            .get(&txid)
            .and_then(|tx| tx.outputs.get(vout as usize))
            .cloned()
            .expect("utxo of a fixture transaction");
        self.utxos.push(Utxo {
            txid,
            vout,
            address: output.address,
            amount_sats: output.value_sats,
            confirmations,
        });
        self
    }

    pub fn graph(&self) -> TxGraph<'_> {
        TxGraph::new(
            self.addresses.clone(),
            self.history.clone(),
            self.utxos.clone(),
            TxCache::new(&self.chain),
        )
    }
}
