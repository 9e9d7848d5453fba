// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Transaction graph
//!
//! [`TxGraph`] is the read-only view every detector works on: the owned addresses, the wallet
//! history indexed by address, the current UTXOs and a [`TxCache`] resolving inputs to the
//! outputs they spend.
//!
//! The graph never reaches beyond the wallet history: a transaction is "owned" only if the
//! history reports it, whatever the decoded transactions could lead to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bitcoin::Txid;
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::descriptor::AddressMap;
use crate::types::{
    DecodedTransaction, Funding, KeychainKind, ScriptType, TxOutput, Utxo, WalletTxRecord,
};

pub mod cache;
pub use self::cache::TxCache;

/// An input resolved to the output it spends
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    /// Funding transaction
    pub txid: Txid,
    /// Output index in the funding transaction
    pub vout: u32,
    /// Address of the spent output
    pub address: Option<String>,
    /// Value of the spent output in satoshi
    pub value_sats: u64,
}

/// Indexed view over the history of a wallet
#[derive(Debug)]
pub struct TxGraph<'a> {
    addresses: AddressMap,
    owned_txids: BTreeSet<Txid>,
    records: BTreeMap<String, Vec<WalletTxRecord>>,
    utxos: Vec<Utxo>,
    cache: TxCache<'a>,
}

impl<'a> TxGraph<'a> {
    /// Build the graph from the derived addresses, the wallet history and its UTXOs
    pub fn new(
        addresses: AddressMap,
        history: Vec<WalletTxRecord>,
        utxos: Vec<Utxo>,
        cache: TxCache<'a>,
    ) -> Self {
        let mut owned_txids = BTreeSet::new();
        let mut records: BTreeMap<String, Vec<WalletTxRecord>> = BTreeMap::new();

        for record in history {
            owned_txids.insert(record.txid);
            if let Some(address) = record.address.clone().filter(|a| !a.is_empty()) {
                records.entry(address).or_default().push(record);
            }
        }
        info!("Unique transaction ids: {}", owned_txids.len());

        TxGraph {
            addresses,
            owned_txids,
            records,
            utxos,
            cache,
        }
    }

    /// Owned addresses
    pub fn addresses(&self) -> &AddressMap {
        &self.addresses
    }

    /// Distinct txids reported by the wallet history, in order
    pub fn owned_txids(&self) -> &BTreeSet<Txid> {
        &self.owned_txids
    }

    /// History entries touching `address`
    pub fn records_of(&self, address: &str) -> &[WalletTxRecord] {
        self.records.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current UTXOs as reported by the wallet
    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    /// Current UTXOs held by an owned address
    pub fn owned_utxos(&self) -> Vec<&Utxo> {
        self.utxos
            .iter()
            .filter(|u| self.owns(u.address.as_deref()))
            .collect()
    }

    /// Branch of an owned address
    pub fn keychain_of(&self, address: Option<&str>) -> Option<KeychainKind> {
        address
            .and_then(|a| self.addresses.get(a))
            .map(|d| d.keychain)
    }

    /// Return the decoded transaction, `None` if it can't be fetched
    pub fn fetch_tx(&self, txid: &Txid) -> Option<Arc<DecodedTransaction>> {
        self.cache.get(txid)
    }

    /// Resolve the inputs of a transaction to the outputs they spend
    ///
    /// Coinbase inputs and inputs whose funding transaction can't be fetched are left out.
    pub fn input_addresses(&self, txid: &Txid) -> Vec<InputRef> {
        let tx = match self.fetch_tx(txid) {
            Some(tx) => tx,
            None => return Vec::new(),
        };

        tx.inputs
            .iter()
            .filter_map(|input| match input.funding {
                Funding::Coinbase => None,
                Funding::Spend { txid, vout } => {
                    let parent = self.fetch_tx(&txid)?;
                    let output = parent.outputs.get(vout as usize)?;
                    Some(InputRef {
                        txid,
                        vout,
                        address: output.address.clone(),
                        value_sats: output.value_sats,
                    })
                }
            })
            .collect()
    }

    /// Outputs of a transaction, empty if it can't be fetched
    pub fn output_addresses(&self, txid: &Txid) -> Vec<TxOutput> {
        self.fetch_tx(txid)
            .map(|tx| tx.outputs.clone())
            .unwrap_or_default()
    }

    /// Exact membership in the owned addresses
    pub fn is_owned(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Like [`TxGraph::is_owned`], `false` for missing addresses
    pub fn owns(&self, address: Option<&str>) -> bool {
        address.map_or(false, |a| self.is_owned(a))
    }

    /// Script type of an address
    ///
    /// Uses the metadata of owned addresses and falls back to the address encoding otherwise.
    pub fn script_type_of(&self, address: Option<&str>) -> ScriptType {
        match address {
            Some(address) => self
                .addresses
                .get(address)
                .map(|d| d.script_type)
                .unwrap_or_else(|| ScriptType::from_address_prefix(address)),
            None => ScriptType::Unknown,
        }
    }

    /// Fetch every owned transaction, the funding transactions of its inputs and of the UTXOs
    pub fn prefetch(&self) {
        let roots: BTreeSet<Txid> = self
            .owned_txids
            .iter()
            .chain(self.utxos.iter().map(|u| &u.txid))
            .cloned()
            .collect();

        roots.par_iter().for_each(|txid| {
            if let Some(tx) = self.fetch_tx(txid) {
                tx.inputs
                    .par_iter()
                    .filter_map(|input| input.prev_txid())
                    .for_each(|parent| {
                        self.fetch_tx(&parent);
                    });
            }
        });
        debug!("Prefetched {} transactions", self.cache.len());
    }
}
