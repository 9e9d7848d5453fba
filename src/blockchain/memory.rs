// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! In-memory blockchain
//!
//! [`MemoryBlockchain`] serves the wallets and transactions of a [`Snapshot`], either built
//! programmatically or loaded from JSON:
//!
//! ```json
//! {
//!   "network": "regtest",
//!   "wallets": {
//!     "alice": {
//!       "descriptors": [{ "desc": "wpkh(tpub.../0/*)", "internal": false, "range_end": 999 }],
//!       "history": [{ "txid": "…", "address": "bcrt1q…", "category": "receive", "amount_sats": 1000000, "confirmations": 3 }],
//!       "unspent": [{ "txid": "…", "vout": 0, "address": "bcrt1q…", "amount_sats": 1000000, "confirmations": 3 }]
//!     }
//!   },
//!   "transactions": [{ "txid": "…", "version": 2, "locktime": 0, "vsize": 141, "inputs": [], "outputs": [] }],
//!   "derivations": { "wpkh(alice/0/*)": ["bcrt1q…"] }
//! }
//! ```
//!
//! Descriptors are parsed and derived offline with `miniscript`, unless a canned list of addresses
//! is registered in `derivations` for that exact descriptor string.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use bitcoin::{Network, Txid};
use log::debug;
use miniscript::descriptor::{Descriptor, DescriptorPublicKey};
use serde::{Deserialize, Serialize};

use super::{Blockchain, ListedDescriptor};
use crate::descriptor::{checksum, DescriptorSpec};
use crate::error::Error;
use crate::types::{DecodedTransaction, Utxo, WalletTxRecord};

/// Content of a wallet in a [`Snapshot`]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSnapshot {
    /// Listed descriptors
    #[serde(default)]
    pub descriptors: Vec<ListedDescriptor>,
    /// Wallet history
    #[serde(default)]
    pub history: Vec<WalletTxRecord>,
    /// Current unspent outputs
    #[serde(default)]
    pub unspent: Vec<Utxo>,
}

/// Serializable state of a [`MemoryBlockchain`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Network used to derive addresses
    #[serde(default = "default_network")]
    pub network: Network,
    /// Wallets by name
    #[serde(default)]
    pub wallets: BTreeMap<String, WalletSnapshot>,
    /// Decoded transactions
    #[serde(default)]
    pub transactions: Vec<DecodedTransaction>,
    /// Canned derivations by descriptor string
    #[serde(default)]
    pub derivations: BTreeMap<String, Vec<String>>,
}

fn default_network() -> Network {
    Network::Regtest
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            network: default_network(),
            wallets: BTreeMap::new(),
            transactions: Vec::new(),
            derivations: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Blockchain backend serving a snapshot held in memory
#[derive(Debug)]
pub struct MemoryBlockchain {
    network: Network,
    wallets: BTreeMap<String, WalletSnapshot>,
    txs: HashMap<Txid, DecodedTransaction>,
    derivations: HashMap<String, Vec<String>>,

    get_tx_calls: Mutex<BTreeMap<Txid, usize>>,
    unloaded: Mutex<Vec<String>>,
}

impl MemoryBlockchain {
    /// Create an empty backend deriving addresses for `network`
    pub fn new(network: Network) -> Self {
        MemoryBlockchain::from_snapshot(Snapshot {
            network,
            ..Default::default()
        })
    }

    /// Create a backend serving `snapshot`
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        MemoryBlockchain {
            network: snapshot.network,
            wallets: snapshot.wallets,
            txs: snapshot
                .transactions
                .into_iter()
                .map(|tx| (tx.txid, tx))
                .collect(),
            derivations: snapshot.derivations.into_iter().collect(),
            get_tx_calls: Mutex::new(BTreeMap::new()),
            unloaded: Mutex::new(Vec::new()),
        }
    }

    /// Load a backend from a JSON snapshot file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(MemoryBlockchain::from_snapshot(Snapshot::load(path)?))
    }

    /// Add or replace a decoded transaction
    pub fn insert_tx(&mut self, tx: DecodedTransaction) {
        self.txs.insert(tx.txid, tx);
    }

    /// Add a history entry to a wallet, creating the wallet if needed
    pub fn insert_wallet_tx(&mut self, wallet: &str, record: WalletTxRecord) {
        self.wallet_mut(wallet).history.push(record);
    }

    /// Add an unspent output to a wallet, creating the wallet if needed
    pub fn insert_utxo(&mut self, wallet: &str, utxo: Utxo) {
        self.wallet_mut(wallet).unspent.push(utxo);
    }

    /// Add a descriptor to a wallet, creating the wallet if needed
    pub fn insert_descriptor(&mut self, wallet: &str, descriptor: ListedDescriptor) {
        self.wallet_mut(wallet).descriptors.push(descriptor);
    }

    /// Register the addresses a descriptor string derives to, bypassing `miniscript`
    pub fn insert_derivation(&mut self, desc: &str, addresses: Vec<String>) {
        self.derivations.insert(desc.to_string(), addresses);
    }

    /// Number of [`Blockchain::get_tx`] calls served so far
    pub fn get_tx_calls(&self) -> usize {
        self.get_tx_calls_by_txid().values().sum()
    }

    /// Number of [`Blockchain::get_tx`] calls served so far, per requested txid
    pub fn get_tx_calls_by_txid(&self) -> BTreeMap<Txid, usize> {
        self.get_tx_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names passed to [`Blockchain::unload_wallet`], in order
    pub fn unloaded_wallets(&self) -> Vec<String> {
        self.unloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn wallet_mut(&mut self, wallet: &str) -> &mut WalletSnapshot {
        self.wallets.entry(wallet.to_string()).or_default()
    }

    fn wallet(&self, wallet: &str) -> Result<&WalletSnapshot, Error> {
        self.wallets
            .get(wallet)
            .ok_or_else(|| Error::WalletNotFound(wallet.to_string()))
    }

    fn canned(&self, desc: &str) -> Option<&Vec<String>> {
        self.derivations
            .get(desc)
            .or_else(|| self.derivations.get(checksum::split_checksum(desc).0))
    }

    fn parse(desc: &str) -> Result<Descriptor<DescriptorPublicKey>, Error> {
        let body = checksum::verified_body(desc)?;
        Ok(Descriptor::<DescriptorPublicKey>::from_str(body)?)
    }
}

impl Blockchain for MemoryBlockchain {
    fn list_descriptors(&self, wallet: &str) -> Result<Vec<ListedDescriptor>, Error> {
        Ok(self.wallet(wallet)?.descriptors.clone())
    }

    fn canonicalize_descriptor(&self, desc: &str) -> Result<String, Error> {
        if self.canned(desc).is_some() {
            return Ok(desc.to_string());
        }

        let descriptor = Self::parse(desc)?;
        Ok(checksum::with_checksum(&descriptor.to_string())?)
    }

    fn derive_addresses(&self, desc: &str, range_end: u32) -> Result<Vec<String>, Error> {
        if let Some(addresses) = self.canned(desc) {
            return Ok(addresses
                .iter()
                .take(range_end as usize + 1)
                .cloned()
                .collect());
        }

        let descriptor = Self::parse(desc)?;
        let last = if descriptor.has_wildcard() { range_end } else { 0 };
        (0..=last)
            .map(|index| {
                let address = descriptor
                    .at_derivation_index(index)
                    .address(self.network)?;
                Ok(address.to_string())
            })
            .collect()
    }

    fn list_transactions(&self, wallet: &str) -> Result<Vec<WalletTxRecord>, Error> {
        let history = &self.wallet(wallet)?.history;
        Ok(history
            .iter()
            .take(super::HISTORY_LIMIT)
            .cloned()
            .collect())
    }

    fn list_unspent(&self, wallet: &str) -> Result<Vec<Utxo>, Error> {
        Ok(self.wallet(wallet)?.unspent.clone())
    }

    fn get_tx(&self, txid: &Txid) -> Result<Option<DecodedTransaction>, Error> {
        *self
            .get_tx_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*txid)
            .or_default() += 1;
        Ok(self.txs.get(txid).cloned())
    }

    fn create_watch_wallet(
        &self,
        name: &str,
        descriptors: &[DescriptorSpec],
    ) -> Result<String, Error> {
        self.wallet(name)?;
        debug!(
            "Serving {} imported descriptors from snapshot wallet `{}`",
            descriptors.len(),
            name
        );

        Ok(name.to_string())
    }

    fn unload_wallet(&self, name: &str) -> Result<(), Error> {
        self.unloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        Ok(())
    }
}
