// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Derived addresses
//!
//! The [`AddressMap`] built here is the only definition of ownership used by the analysis: an
//! address that isn't in the map is external, even if the wallet could derive it from a branch
//! or an index that wasn't listed.

use std::collections::btree_map::{self, BTreeMap};

use log::{info, warn};
use serde::Serialize;

use super::{DescriptorSpec, DEFAULT_RANGE_END};
use crate::blockchain::Blockchain;
use crate::types::{KeychainKind, ScriptType};

/// Metadata of an address derived from one of the wallet descriptors
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    /// Script type of the descriptor it was derived from
    pub script_type: ScriptType,
    /// Branch of the descriptor
    pub keychain: KeychainKind,
    /// Derivation index
    pub index: u32,
}

/// Map of every address owned by the wallet
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct AddressMap(BTreeMap<String, DerivedAddress>);

impl AddressMap {
    /// Create an empty map
    pub fn new() -> Self {
        AddressMap::default()
    }

    /// Insert an address, replacing the metadata of an address derived twice
    pub fn insert(&mut self, address: String, derived: DerivedAddress) {
        self.0.insert(address, derived);
    }

    /// Metadata of an owned address
    pub fn get(&self, address: &str) -> Option<&DerivedAddress> {
        self.0.get(address)
    }

    /// Exact membership test
    pub fn contains(&self, address: &str) -> bool {
        self.0.contains_key(address)
    }

    /// Number of owned addresses
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` if no address was derived
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the addresses in lexicographic order
    pub fn iter(&self) -> btree_map::Iter<'_, String, DerivedAddress> {
        self.0.iter()
    }

    /// Number of addresses per script type
    pub fn count_by_type(&self) -> BTreeMap<ScriptType, usize> {
        self.0.values().fold(BTreeMap::new(), |mut acc, d| {
            *acc.entry(d.script_type).or_default() += 1;
            acc
        })
    }
}

/// Derive the addresses of every descriptor
///
/// Each descriptor is derived over `0..=min(range_end, 999)`. A descriptor the backend can't
/// derive is logged and contributes no address.
pub fn derive_all_addresses<B: Blockchain + ?Sized>(
    blockchain: &B,
    descriptors: &[DescriptorSpec],
) -> AddressMap {
    let mut map = AddressMap::new();

    for spec in descriptors {
        let script_type = spec.script_type();
        let range_end = spec.range_end.min(DEFAULT_RANGE_END);

        let addresses = match blockchain.derive_addresses(&spec.desc, range_end) {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("Can't derive from `{}`: {}", spec.desc, e);
                continue;
            }
        };

        for (index, address) in addresses.into_iter().enumerate() {
            map.insert(
                address,
                DerivedAddress {
                    script_type,
                    keychain: spec.keychain,
                    index: index as u32,
                },
            );
        }
    }

    info!("Derived {} addresses", map.len());
    for (script_type, count) in map.count_by_type() {
        info!("  {}: {} addresses", script_type, count);
    }

    map
}
