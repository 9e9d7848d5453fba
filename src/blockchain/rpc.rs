// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Rpc Blockchain
//!
//! Backend that reads wallets and transactions from Bitcoin Core RPC
//!
//! Decoding arbitrary transactions requires the node to run with `txindex=1`, otherwise only the
//! wallet transactions and the ones still in the mempool can be resolved.
//!
//! ## Example
//!
//! ```no_run
//! # use privacy_audit::blockchain::{RpcConfig, RpcBlockchain, rpc::Auth};
//! let config = RpcConfig {
//!     url: "127.0.0.1:18332".to_string(),
//!     auth: Auth::Cookie {
//!         file: "/home/user/.bitcoin/.cookie".into(),
//!     },
//!     network: privacy_audit::bitcoin::Network::Testnet,
//!     timeout_secs: 60,
//! };
//! let blockchain = RpcBlockchain::from_config(&config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bitcoin::util::amount::serde::as_btc;
use bitcoin::{Amount, Network, SignedAmount, Txid};
use bitcoincore_rpc::jsonrpc::simple_http::SimpleHttpTransport;
use bitcoincore_rpc::Auth as RpcAuth;
use bitcoincore_rpc::{Client, RpcApi};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Blockchain, ListedDescriptor, HISTORY_LIMIT};
use crate::descriptor::DescriptorSpec;
use crate::error::Error;
use crate::types::{
    Category, DecodedTransaction, Funding, ScriptType, TxInput, TxOutput, Utxo, WalletTxRecord,
};

/// Highest confirmation count requested when listing UTXOs
const MAX_CONFIRMATIONS: u32 = 9_999_999;

fn default_timeout() -> u64 {
    60
}

/// RpcBlockchain configuration options
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcConfig {
    /// The bitcoin node url
    pub url: String,
    /// The bitcoin node authentication mechanism
    pub auth: Auth,
    /// The network we are using (it will be checked the bitcoin node network matches this)
    pub network: Network,
    /// Timeout of a single call, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// This struct is equivalent to [bitcoincore_rpc::Auth] but it implements [serde::Serialize]
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(untagged)]
pub enum Auth {
    /// None authentication
    None,
    /// Authentication with username and password, usually [Auth::Cookie] should be preferred
    UserPass {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Authentication with a cookie file
    Cookie {
        /// Cookie file
        file: PathBuf,
    },
}

impl From<Auth> for RpcAuth {
    fn from(auth: Auth) -> Self {
        match auth {
            Auth::None => RpcAuth::None,
            Auth::UserPass { username, password } => RpcAuth::UserPass(username, password),
            Auth::Cookie { file } => RpcAuth::CookieFile(file),
        }
    }
}

/// Bitcoin Core backend
///
/// Node-wide calls go to `url`, wallet calls to `url/wallet/<name>`.
#[derive(Debug)]
pub struct RpcBlockchain {
    config: RpcConfig,
    /// Client for the node-wide calls
    client: Client,
}

impl RpcBlockchain {
    /// Connect to the node and check it runs on the configured network
    pub fn from_config(config: &RpcConfig) -> Result<Self, Error> {
        let client = connect(config, &config.url)?;

        let blockchain_info = client.get_blockchain_info()?;
        let network = match blockchain_info.chain.as_str() {
            "main" => Network::Bitcoin,
            "test" => Network::Testnet,
            "regtest" => Network::Regtest,
            "signet" => Network::Signet,
            _ => return Err(Error::Generic("Invalid network".to_string())),
        };
        if network != config.network {
            return Err(Error::Generic(format!(
                "Invalid network: requested {} but the node runs {}",
                config.network, network
            )));
        }
        debug!("connected to {} ({})", config.url, network);

        Ok(RpcBlockchain {
            config: config.clone(),
            client,
        })
    }

    fn wallet_client(&self, wallet: &str) -> Result<Client, Error> {
        connect(
            &self.config,
            &format!("{}/wallet/{}", self.config.url, wallet),
        )
    }

    /// Load a wallet from the wallet directory, or create a blank watch-only descriptor wallet
    fn open_watch_wallet(&self, name: &str) -> Result<(), Error> {
        let loaded = self.client.list_wallets()?;
        if loaded.iter().any(|w| w == name) {
            debug!("wallet already loaded {:?}", name);
            return Ok(());
        }

        if list_wallet_dir(&self.client)?.iter().any(|w| w == name) {
            let _: Value = self.client.call("loadwallet", &[json!(name)])?;
            debug!("wallet loaded {:?}", name);
        } else {
            // name, disable_private_keys, blank, passphrase, avoid_reuse, descriptors
            let args = [
                json!(name),
                json!(true),
                json!(true),
                json!(""),
                json!(false),
                json!(true),
            ];
            let _: Value = self.client.call("createwallet", &args)?;
            debug!("wallet created {:?}", name);
        }

        Ok(())
    }
}

/// Build a client with the configured timeout and authentication
fn connect(config: &RpcConfig, url: &str) -> Result<Client, Error> {
    let (user, pass) = RpcAuth::from(config.auth.clone()).get_user_pass()?;

    let mut builder = SimpleHttpTransport::builder()
        .url(url)
        .map_err(|e| Error::Generic(format!("Invalid RPC url `{}`: {}", url, e)))?
        .timeout(Duration::from_secs(config.timeout_secs));
    if let Some(user) = user {
        builder = builder.auth(user, pass);
    }

    let transport = bitcoincore_rpc::jsonrpc::Client::with_transport(builder.build());
    Ok(Client::from_jsonrpc(transport))
}

/// return the wallets available in default wallet directory
fn list_wallet_dir(client: &Client) -> Result<Vec<String>, Error> {
    #[derive(Deserialize)]
    struct Name {
        name: String,
    }
    #[derive(Deserialize)]
    struct CallResult {
        wallets: Vec<Name>,
    }

    let result: CallResult = client.call("listwalletdir", &[])?;
    Ok(result.wallets.into_iter().map(|n| n.name).collect())
}

#[derive(Deserialize)]
struct ListDescriptorsResult {
    descriptors: Vec<ListDescriptorsEntry>,
}

#[derive(Deserialize)]
struct ListDescriptorsEntry {
    desc: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    internal: Option<bool>,
    #[serde(default)]
    range: Option<(u32, u32)>,
}

#[derive(Deserialize)]
struct DescriptorInfo {
    descriptor: String,
}

#[derive(Deserialize)]
struct ListTransactionsEntry {
    txid: Txid,
    #[serde(default)]
    address: Option<String>,
    category: String,
    #[serde(with = "as_btc")]
    amount: SignedAmount,
    confirmations: i64,
    #[serde(default)]
    blockheight: Option<u32>,
}

#[derive(Deserialize)]
struct ListUnspentEntry {
    txid: Txid,
    vout: u32,
    #[serde(default)]
    address: Option<String>,
    #[serde(with = "as_btc")]
    amount: Amount,
    confirmations: u32,
}

#[derive(Deserialize)]
struct RawTransaction {
    txid: Txid,
    version: i32,
    locktime: u32,
    vsize: u64,
    #[serde(default)]
    confirmations: Option<u32>,
    vin: Vec<RawInput>,
    vout: Vec<RawOutput>,
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(default)]
    coinbase: Option<String>,
    #[serde(default)]
    txid: Option<Txid>,
    #[serde(default)]
    vout: Option<u32>,
    sequence: u32,
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(with = "as_btc")]
    value: Amount,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pubkey: RawScriptPubKey,
}

#[derive(Deserialize)]
struct RawScriptPubKey {
    #[serde(rename = "type")]
    script_type: String,
    #[serde(default)]
    address: Option<String>,
    // before Core 22
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ImportResult {
    success: bool,
    #[serde(default)]
    error: Option<Value>,
}

impl RawTransaction {
    fn into_decoded(self) -> Result<DecodedTransaction, Error> {
        let inputs = self
            .vin
            .into_iter()
            .map(|vin| {
                let funding = match (vin.coinbase, vin.txid, vin.vout) {
                    (Some(_), _, _) => Funding::Coinbase,
                    (None, Some(txid), Some(vout)) => Funding::Spend { txid, vout },
                    _ => {
                        return Err(Error::InvalidResponse(
                            "input without prevout".to_string(),
                        ))
                    }
                };
                Ok(TxInput {
                    funding,
                    sequence: vin.sequence,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let outputs = self
            .vout
            .into_iter()
            .map(|vout| {
                let RawScriptPubKey {
                    script_type,
                    address,
                    addresses,
                } = vout.script_pubkey;
                TxOutput {
                    n: vout.n,
                    value_sats: vout.value.to_sat(),
                    script_type: ScriptType::from_core_type(&script_type),
                    address: address.or_else(|| addresses.and_then(|a| a.into_iter().next())),
                }
            })
            .collect();

        Ok(DecodedTransaction {
            txid: self.txid,
            version: self.version,
            locktime: self.locktime,
            vsize: self.vsize,
            confirmations: self.confirmations,
            inputs,
            outputs,
        })
    }
}

impl Blockchain for RpcBlockchain {
    fn list_descriptors(&self, wallet: &str) -> Result<Vec<ListedDescriptor>, Error> {
        let result: ListDescriptorsResult = self.wallet_client(wallet)?.call("listdescriptors", &[])?;

        Ok(result
            .descriptors
            .into_iter()
            .map(|d| ListedDescriptor {
                internal: d.internal.unwrap_or(false),
                active: d.active,
                range_end: d
                    .range
                    .map(|(_, end)| end)
                    .unwrap_or(crate::descriptor::DEFAULT_RANGE_END),
                desc: d.desc,
            })
            .collect())
    }

    fn canonicalize_descriptor(&self, desc: &str) -> Result<String, Error> {
        let info: DescriptorInfo = self.client.call("getdescriptorinfo", &[json!(desc)])?;
        Ok(info.descriptor)
    }

    fn derive_addresses(&self, desc: &str, range_end: u32) -> Result<Vec<String>, Error> {
        // a range is rejected for descriptors without a wildcard
        let args = if desc.contains('*') {
            vec![json!(desc), json!([0, range_end])]
        } else {
            vec![json!(desc)]
        };
        Ok(self.client.call("deriveaddresses", &args)?)
    }

    fn list_transactions(&self, wallet: &str) -> Result<Vec<WalletTxRecord>, Error> {
        let entries: Vec<ListTransactionsEntry> = self.wallet_client(wallet)?.call(
            "listtransactions",
            &[json!("*"), json!(HISTORY_LIMIT), json!(0), json!(true)],
        )?;

        Ok(entries
            .into_iter()
            .map(|e| WalletTxRecord {
                txid: e.txid,
                address: e.address,
                category: Category::from_core(&e.category),
                amount_sats: e.amount.to_sat(),
                confirmations: e.confirmations,
                block_height: e.blockheight,
            })
            .collect())
    }

    fn list_unspent(&self, wallet: &str) -> Result<Vec<Utxo>, Error> {
        let entries: Vec<ListUnspentEntry> = self
            .wallet_client(wallet)?
            .call("listunspent", &[json!(0), json!(MAX_CONFIRMATIONS)])?;

        Ok(entries
            .into_iter()
            .map(|e| Utxo {
                txid: e.txid,
                vout: e.vout,
                address: e.address,
                amount_sats: e.amount.to_sat(),
                confirmations: e.confirmations,
            })
            .collect())
    }

    fn get_tx(&self, txid: &Txid) -> Result<Option<DecodedTransaction>, Error> {
        let raw: RawTransaction = match self
            .client
            .call("getrawtransaction", &[json!(txid.to_string()), json!(true)])
        {
            Ok(raw) => raw,
            Err(bitcoincore_rpc::Error::JsonRpc(bitcoincore_rpc::jsonrpc::Error::Rpc(e)))
                if e.code == -5 =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };

        raw.into_decoded().map(Some)
    }

    fn create_watch_wallet(
        &self,
        name: &str,
        descriptors: &[DescriptorSpec],
    ) -> Result<String, Error> {
        self.open_watch_wallet(name)?;

        let requests: Vec<Value> = descriptors
            .iter()
            .map(|d| {
                let mut request = json!({
                    "desc": d.desc,
                    "timestamp": 0,
                    "active": d.active,
                    "internal": d.keychain.is_internal(),
                });
                if d.desc.contains('*') {
                    request["range"] = json!([0, d.range_end]);
                }
                request
            })
            .collect();

        info!(
            "Importing {} descriptors into `{}`, rescanning from genesis",
            requests.len(),
            name
        );
        let results: Vec<ImportResult> = self
            .wallet_client(name)?
            .call("importdescriptors", &[Value::Array(requests)])?;
        for (result, spec) in results.iter().zip(descriptors) {
            if !result.success {
                warn!(
                    "Import of `{}` failed: {}",
                    spec.desc,
                    result.error.clone().unwrap_or(Value::Null)
                );
            }
        }

        Ok(name.to_string())
    }

    fn unload_wallet(&self, name: &str) -> Result<(), Error> {
        let _: Value = self.client.call("unloadwallet", &[json!(name)])?;
        debug!("wallet unloaded {:?}", name);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config: RpcConfig = serde_json::from_str(
            r#"{
                "url": "127.0.0.1:18443",
                "auth": { "username": "user", "password": "pass" },
                "network": "regtest"
            }"#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 60);
        assert_eq!(
            config.auth,
            Auth::UserPass {
                username: "user".into(),
                password: "pass".into()
            }
        );

        let cookie: Auth = serde_json::from_str(r#"{ "file": "/tmp/.cookie" }"#).unwrap();
        assert_eq!(
            cookie,
            Auth::Cookie {
                file: "/tmp/.cookie".into()
            }
        );
    }

    #[test]
    fn test_decode_raw_transaction() {
        let raw: RawTransaction = serde_json::from_value(json!({
            "txid": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "version": 2,
            "locktime": 120,
            "vsize": 141,
            "vin": [
                { "coinbase": "03a0860100", "sequence": 4294967295u32 },
                {
                    "txid": "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098",
                    "vout": 1,
                    "sequence": 4294967293u32
                }
            ],
            "vout": [
                {
                    "value": 0.05,
                    "n": 0,
                    "scriptPubKey": { "type": "witness_v0_keyhash", "address": "bcrt1qexample" }
                },
                {
                    "value": 0.00000546,
                    "n": 1,
                    "scriptPubKey": { "type": "pubkeyhash", "addresses": ["mexample"] }
                },
                {
                    "value": 0.0,
                    "n": 2,
                    "scriptPubKey": { "type": "nulldata" }
                },
                {
                    "value": 0.001,
                    "n": 3,
                    "scriptPubKey": {
                        "type": "witness_v1_taproot",
                        "address": "bcrt1pexample",
                        "addresses": ["bcrt1pstale"]
                    }
                }
            ]
        }))
        .unwrap();

        let tx = raw.into_decoded().unwrap();
        assert_eq!(tx.locktime, 120);
        assert_eq!(tx.confirmations, None);
        assert!(tx.inputs[0].is_coinbase());
        assert!(tx.inputs[1].signals_rbf());
        assert_eq!(tx.outputs[0].value_sats, 5_000_000);
        assert_eq!(tx.outputs[0].script_type, ScriptType::P2wpkh);
        assert_eq!(tx.outputs[1].value_sats, 546);
        assert_eq!(tx.outputs[1].address.as_deref(), Some("mexample"));
        assert_eq!(tx.outputs[1].script_type, ScriptType::P2pkh);
        assert_eq!(tx.outputs[2].script_type, ScriptType::Unknown);
        assert_eq!(tx.outputs[2].address, None);
        // `address` wins over the pre-22 `addresses` list
        assert_eq!(tx.outputs[3].address.as_deref(), Some("bcrt1pexample"));
        assert_eq!(tx.outputs[3].script_type, ScriptType::P2tr);
    }

    #[test]
    fn test_history_entry_amounts() {
        let entry: ListTransactionsEntry = serde_json::from_value(json!({
            "txid": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "address": "bcrt1qexample",
            "category": "send",
            "amount": -0.0123,
            "confirmations": 3,
            "blockheight": 210
        }))
        .unwrap();

        assert_eq!(entry.amount.to_sat(), -1_230_000);
        assert_eq!(Category::from_core(&entry.category), Category::Send);
        assert_eq!(entry.blockheight, Some(210));
    }
}
