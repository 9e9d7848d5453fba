// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Blockchain backends
//!
//! This module provides the [`Blockchain`] trait, which is the only way the analysis talks to a
//! node: listing descriptors, deriving addresses, reading the wallet history and decoding
//! transactions. Two implementations are available: [`MemoryBlockchain`], which serves a snapshot
//! held in memory, and, with the `rpc` feature, [`RpcBlockchain`](rpc::RpcBlockchain), which
//! talks to Bitcoin Core.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorSpec;
use crate::error::Error;
use crate::types::{DecodedTransaction, Utxo, WalletTxRecord};

pub mod memory;
pub use self::memory::{MemoryBlockchain, Snapshot, WalletSnapshot};

#[cfg(feature = "rpc")]
#[cfg_attr(docsrs, doc(cfg(feature = "rpc")))]
pub mod rpc;
#[cfg(feature = "rpc")]
pub use self::rpc::{RpcBlockchain, RpcConfig};

/// Maximum number of history entries requested from a wallet
pub const HISTORY_LIMIT: usize = 10_000;

/// A descriptor as listed by a wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ListedDescriptor {
    /// Descriptor string, usually with its checksum
    pub desc: String,
    /// Whether it derives change addresses
    #[serde(default)]
    pub internal: bool,
    /// Whether the wallet actively hands out addresses from it
    #[serde(default = "default_active")]
    pub active: bool,
    /// Last derivation index covered by the wallet
    #[serde(default = "default_range_end")]
    pub range_end: u32,
}

fn default_active() -> bool {
    true
}

fn default_range_end() -> u32 {
    crate::descriptor::DEFAULT_RANGE_END
}

/// Trait for the node-side collaborator of a scan
///
/// Every call is a blocking request. Callers treat errors as missing data: a transaction that
/// can't be decoded is skipped, a descriptor that can't be derived contributes no addresses.
pub trait Blockchain: Sync {
    /// List the descriptors of a wallet
    fn list_descriptors(&self, wallet: &str) -> Result<Vec<ListedDescriptor>, Error>;

    /// Return the canonical, checksummed form of a descriptor
    fn canonicalize_descriptor(&self, desc: &str) -> Result<String, Error>;

    /// Derive the addresses of a descriptor for the indexes `0..=range_end`
    fn derive_addresses(&self, desc: &str, range_end: u32) -> Result<Vec<String>, Error>;

    /// List the history of a wallet, watch-only entries included
    fn list_transactions(&self, wallet: &str) -> Result<Vec<WalletTxRecord>, Error>;

    /// List the current unspent outputs of a wallet, unconfirmed included
    fn list_unspent(&self, wallet: &str) -> Result<Vec<Utxo>, Error>;

    /// Fetch and decode a transaction, `None` if the backend doesn't know it
    fn get_tx(&self, txid: &Txid) -> Result<Option<DecodedTransaction>, Error>;

    /// Create a watch-only wallet tracking `descriptors`, rescanning from genesis
    ///
    /// Returns the name of the wallet that will serve the history.
    fn create_watch_wallet(
        &self,
        name: &str,
        descriptors: &[DescriptorSpec],
    ) -> Result<String, Error>;

    /// Unload a wallet previously created with [`Blockchain::create_watch_wallet`]
    fn unload_wallet(&self, name: &str) -> Result<(), Error>;
}
