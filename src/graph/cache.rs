// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Decoded transaction cache
//!
//! Every transaction is fetched from the backend at most once per [`TxCache`]. Each txid gets its
//! own slot: the map lock is only held to find or create the slot, and concurrent callers asking
//! for the same txid wait on the slot lock while the first one fetches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bitcoin::Txid;
use log::{debug, warn};

use crate::blockchain::Blockchain;
use crate::types::DecodedTransaction;

/// `None` until fetched, then the fetch result
type Slot = Mutex<Option<Option<Arc<DecodedTransaction>>>>;

/// Single-flight cache of decoded transactions
pub struct TxCache<'a> {
    blockchain: &'a dyn Blockchain,
    slots: Mutex<HashMap<Txid, Arc<Slot>>>,
}

impl<'a> TxCache<'a> {
    /// Create an empty cache fetching from `blockchain`
    pub fn new(blockchain: &'a dyn Blockchain) -> Self {
        TxCache {
            blockchain,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the decoded transaction, fetching it on the first request
    ///
    /// A failed fetch is remembered as "not found" and isn't retried.
    pub fn get(&self, txid: &Txid) -> Option<Arc<DecodedTransaction>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(*txid).or_default())
        };

        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = entry.as_ref() {
            return cached.clone();
        }

        let fetched = match self.blockchain.get_tx(txid) {
            Ok(Some(tx)) => Some(Arc::new(tx)),
            Ok(None) => {
                debug!("Transaction {} not found", txid);
                None
            }
            Err(e) => {
                warn!("Can't fetch transaction {}: {}", txid, e);
                None
            }
        };
        *entry = Some(fetched.clone());

        fetched
    }

    /// Number of txids requested so far
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Return `true` if nothing was requested yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TxCache<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxCache").field("len", &self.len()).finish()
    }
}
