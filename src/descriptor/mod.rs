// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Descriptors
//!
//! This module turns the user input of a scan, either a wallet name or a list of raw descriptor
//! strings, into the set of [`DescriptorSpec`]s whose addresses define what the wallet owns.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::blockchain::Blockchain;
use crate::error::Error;
use crate::types::{KeychainKind, ScriptType};

pub mod checksum;
pub mod derived;
pub mod error;

pub use self::checksum::calc_checksum;
pub use self::derived::{derive_all_addresses, AddressMap, DerivedAddress};

/// Last derivation index used for raw descriptors, and upper bound for every descriptor
pub const DEFAULT_RANGE_END: u32 = 999;

const EXTERNAL_BRANCH: &str = "/0/*";
const INTERNAL_BRANCH: &str = "/1/*";

/// A descriptor whose addresses belong to the analyzed wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSpec {
    /// Descriptor string, canonical when the backend could normalize it
    pub desc: String,
    /// Branch the descriptor derives
    pub keychain: KeychainKind,
    /// Whether addresses are actively handed out from it
    pub active: bool,
    /// Last derivation index
    pub range_end: u32,
}

impl DescriptorSpec {
    /// Script type of the addresses, from the outer descriptor function
    pub fn script_type(&self) -> ScriptType {
        ScriptType::from_descriptor(&self.desc)
    }
}

/// Resolve the descriptors to analyze
///
/// When `wallet` is set its descriptor listing is used and `raw` is ignored. Otherwise every raw
/// descriptor is stripped of its checksum, completed with the mirror branch when it derives a
/// `/0/*` or `/1/*` path, and canonicalized by the backend. A descriptor the backend can't
/// canonicalize is kept verbatim.
///
/// Fails only when neither a wallet nor any descriptor is provided.
pub fn resolve_descriptors<B: Blockchain + ?Sized>(
    blockchain: &B,
    wallet: Option<&str>,
    raw: &[String],
) -> Result<Vec<DescriptorSpec>, Error> {
    if let Some(wallet) = wallet {
        let listed = blockchain.list_descriptors(wallet).unwrap_or_else(|e| {
            warn!("Can't list the descriptors of wallet `{}`: {}", wallet, e);
            Vec::new()
        });

        let specs: Vec<_> = listed
            .into_iter()
            .map(|d| DescriptorSpec {
                desc: d.desc,
                keychain: if d.internal {
                    KeychainKind::Internal
                } else {
                    KeychainKind::External
                },
                active: d.active,
                range_end: d.range_end,
            })
            .collect();
        info!("Wallet `{}` lists {} descriptors", wallet, specs.len());
        return Ok(specs);
    }

    if raw.is_empty() {
        return Err(Error::NoWalletOrDescriptor);
    }

    let specs: Vec<_> = raw
        .iter()
        .flat_map(|r| branches(checksum::strip_checksum(r)))
        .map(|(desc, keychain)| {
            let desc = blockchain
                .canonicalize_descriptor(&desc)
                .unwrap_or_else(|e| {
                    debug!("Using `{}` verbatim, canonicalization failed: {}", desc, e);
                    desc
                });

            DescriptorSpec {
                desc,
                keychain,
                active: true,
                range_end: DEFAULT_RANGE_END,
            }
        })
        .collect();
    info!(
        "Resolved {} descriptors from {} supplied",
        specs.len(),
        raw.len()
    );

    Ok(specs)
}

/// Expand a descriptor body into the external and internal branches it implies
fn branches(body: &str) -> Vec<(String, KeychainKind)> {
    if body.contains(EXTERNAL_BRANCH) {
        vec![
            (body.to_string(), KeychainKind::External),
            (
                body.replace(EXTERNAL_BRANCH, INTERNAL_BRANCH),
                KeychainKind::Internal,
            ),
        ]
    } else if body.contains(INTERNAL_BRANCH) {
        vec![
            (
                body.replace(INTERNAL_BRANCH, EXTERNAL_BRANCH),
                KeychainKind::External,
            ),
            (body.to_string(), KeychainKind::Internal),
        ]
    } else {
        vec![(body.to_string(), KeychainKind::External)]
    }
}
