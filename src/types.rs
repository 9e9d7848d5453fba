// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::fmt;

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

/// Types of keychains
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KeychainKind {
    /// External
    External = 0,
    /// Internal, usually used for change outputs
    Internal = 1,
}

impl KeychainKind {
    /// Return `true` for the change branch
    pub fn is_internal(&self) -> bool {
        *self == KeychainKind::Internal
    }

    /// Human readable role of addresses on this branch
    pub fn role(&self) -> &'static str {
        match self {
            KeychainKind::External => "receive",
            KeychainKind::Internal => "change",
        }
    }
}

/// Script type of an address or an output
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptType {
    /// Native segwit v0 key hash
    #[serde(rename = "p2wpkh")]
    P2wpkh,
    /// Taproot
    #[serde(rename = "p2tr")]
    P2tr,
    /// Segwit v0 key hash nested in P2SH
    #[serde(rename = "p2sh-p2wpkh")]
    P2shP2wpkh,
    /// Legacy key hash
    #[serde(rename = "p2pkh")]
    P2pkh,
    /// Anything else
    #[serde(rename = "unknown")]
    Unknown,
}

impl ScriptType {
    /// Classify a descriptor by its outer function
    pub fn from_descriptor(desc: &str) -> Self {
        if desc.starts_with("wpkh(") {
            ScriptType::P2wpkh
        } else if desc.starts_with("tr(") {
            ScriptType::P2tr
        } else if desc.starts_with("sh(wpkh(") {
            ScriptType::P2shP2wpkh
        } else if desc.starts_with("pkh(") {
            ScriptType::P2pkh
        } else {
            ScriptType::Unknown
        }
    }

    /// Guess the script type of an address from its encoding
    ///
    /// Covers the bech32 HRPs of mainnet, testnet/signet and regtest, followed by the witness
    /// version character, and the base58 P2SH prefixes of all networks.
    pub fn from_address_prefix(address: &str) -> Self {
        const P2WPKH: [&str; 3] = ["bc1q", "tb1q", "bcrt1q"];
        const P2TR: [&str; 3] = ["bc1p", "tb1p", "bcrt1p"];

        if P2WPKH.iter().any(|p| address.starts_with(*p)) {
            ScriptType::P2wpkh
        } else if P2TR.iter().any(|p| address.starts_with(*p)) {
            ScriptType::P2tr
        } else if address.starts_with('2') || address.starts_with('3') {
            ScriptType::P2shP2wpkh
        } else {
            ScriptType::Unknown
        }
    }

    /// Map the `scriptPubKey.type` field returned by Bitcoin Core
    pub fn from_core_type(core_type: &str) -> Self {
        match core_type {
            "witness_v0_keyhash" => ScriptType::P2wpkh,
            "witness_v1_taproot" => ScriptType::P2tr,
            "scripthash" => ScriptType::P2shP2wpkh,
            "pubkeyhash" => ScriptType::P2pkh,
            _ => ScriptType::Unknown,
        }
    }

    /// Return `true` unless this is [`ScriptType::Unknown`]
    pub fn is_known(&self) -> bool {
        *self != ScriptType::Unknown
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptType::P2wpkh => "p2wpkh",
            ScriptType::P2tr => "p2tr",
            ScriptType::P2shP2wpkh => "p2sh-p2wpkh",
            ScriptType::P2pkh => "p2pkh",
            ScriptType::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a wallet history entry
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Funds leaving the wallet
    Send,
    /// Funds entering the wallet
    Receive,
    /// Coinbase and other entries that are neither
    Other,
}

impl Category {
    /// Parse the `category` field of `listtransactions`
    pub fn from_core(category: &str) -> Self {
        match category {
            "send" => Category::Send,
            "receive" => Category::Receive,
            _ => Category::Other,
        }
    }
}

/// One (address, transaction) touch reported by the wallet history
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WalletTxRecord {
    /// Transaction id
    pub txid: Txid,
    /// Address involved, missing for non-standard scripts
    #[serde(default)]
    pub address: Option<String>,
    /// Direction
    pub category: Category,
    /// Amount in satoshi, negative for sends
    pub amount_sats: i64,
    /// Confirmations, negative for conflicted transactions
    #[serde(default)]
    pub confirmations: i64,
    /// Confirmed in block height, `None` means unconfirmed
    #[serde(default)]
    pub block_height: Option<u32>,
}

/// Where the coins spent by an input come from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Funding {
    /// Newly minted coins
    Coinbase,
    /// A previous transaction output
    Spend {
        /// Funding transaction
        txid: Txid,
        /// Output index in the funding transaction
        vout: u32,
    },
}

/// A decoded transaction input
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Funding output, or the coinbase marker
    pub funding: Funding,
    /// nSequence
    pub sequence: u32,
}

impl TxInput {
    /// Return `true` if this input mints new coins
    pub fn is_coinbase(&self) -> bool {
        self.funding == Funding::Coinbase
    }

    /// Txid of the funding transaction
    pub fn prev_txid(&self) -> Option<Txid> {
        match self.funding {
            Funding::Coinbase => None,
            Funding::Spend { txid, .. } => Some(txid),
        }
    }

    /// Whether the input signals replace-by-fee (BIP125)
    pub fn signals_rbf(&self) -> bool {
        self.sequence < 0xFFFFFFFE
    }
}

/// A decoded transaction output
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Output index
    pub n: u32,
    /// Value in satoshi
    pub value_sats: u64,
    /// Script type as reported by the decoder
    pub script_type: ScriptType,
    /// Address, missing for scripts without an address form
    #[serde(default)]
    pub address: Option<String>,
}

/// A transaction as returned by the node's decoder
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    /// Transaction id
    pub txid: Txid,
    /// nVersion
    pub version: i32,
    /// nLockTime
    pub locktime: u32,
    /// Virtual size in vbytes
    pub vsize: u64,
    /// Confirmations, `None` when unconfirmed or unknown
    #[serde(default)]
    pub confirmations: Option<u32>,
    /// Inputs in order
    pub inputs: Vec<TxInput>,
    /// Outputs in order
    pub outputs: Vec<TxOutput>,
}

impl DecodedTransaction {
    /// Sum of all the output values
    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }
}

/// An unspent output currently held by the wallet
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Funding transaction
    pub txid: Txid,
    /// Output index
    pub vout: u32,
    /// Address holding the output
    #[serde(default)]
    pub address: Option<String>,
    /// Value in satoshi
    pub amount_sats: u64,
    /// Confirmations, 0 for mempool outputs
    #[serde(default)]
    pub confirmations: u32,
}
