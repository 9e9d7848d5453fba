// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Command line options of the `privacy-audit` tool

use std::path::PathBuf;

use bitcoin::Network;
use log::debug;
use structopt::StructOpt;

use crate::blockchain::rpc::Auth;
use crate::blockchain::{Blockchain, MemoryBlockchain, RpcBlockchain, RpcConfig};
use crate::error::Error;
use crate::report::Report;
use crate::scan::{ScanRequest, Scanner, DEFAULT_SCAN_WALLET};

/// Audit the on-chain privacy of a descriptor wallet
#[derive(Debug, StructOpt, Clone, PartialEq)]
#[structopt(
    name = "privacy-audit",
    about = "Detects privacy leaks in the history of a descriptor wallet"
)]
pub struct ScanOpt {
    /// Wallet to analyze, its descriptors and history are read from the node
    #[structopt(short = "w", long = "wallet")]
    pub wallet: Option<String>,
    /// Descriptors to analyze when no wallet is given
    ///
    /// They go before the wallet lists, or after `--`.
    #[structopt(name = "DESCRIPTOR")]
    pub descriptors: Vec<String>,
    /// Wallets whose transactions are considered risky
    #[structopt(long = "known-risky-wallets", min_values = 1)]
    pub known_risky_wallets: Vec<String>,
    /// Wallets of known exchanges
    #[structopt(long = "known-exchange-wallets", min_values = 1)]
    pub known_exchange_wallets: Vec<String>,
    /// Leave the temporary scan wallet loaded
    #[structopt(long = "keep-scan-wallet")]
    pub keep_scan_wallet: bool,
    /// Name of the temporary scan wallet
    #[structopt(long = "scan-wallet-name", default_value = "_detect_scan")]
    pub scan_wallet_name: String,
    /// Bitcoin Core RPC url
    #[structopt(long = "rpc-url", default_value = "127.0.0.1:18443")]
    pub rpc_url: String,
    /// Bitcoin Core cookie file, preferred over user and password
    #[structopt(long = "rpc-cookie")]
    pub rpc_cookie: Option<PathBuf>,
    /// Bitcoin Core RPC user
    #[structopt(long = "rpc-user")]
    pub rpc_user: Option<String>,
    /// Bitcoin Core RPC password
    #[structopt(long = "rpc-password")]
    pub rpc_password: Option<String>,
    /// Timeout of a single RPC call, in seconds
    #[structopt(long = "rpc-timeout", default_value = "60")]
    pub rpc_timeout: u64,
    /// Network of the node
    #[structopt(short = "n", long = "network", default_value = "regtest")]
    pub network: Network,
    /// Read everything from a JSON snapshot instead of a node
    #[structopt(long = "snapshot")]
    pub snapshot: Option<PathBuf>,
}

impl ScanOpt {
    /// Parameters of the scan
    pub fn request(&self) -> ScanRequest {
        ScanRequest {
            wallet: self.wallet.clone().filter(|w| !w.is_empty()),
            descriptors: self.descriptors.clone(),
            known_risky_wallets: self.known_risky_wallets.clone(),
            known_exchange_wallets: self.known_exchange_wallets.clone(),
            keep_scan_wallet: self.keep_scan_wallet,
            scan_wallet_name: self.scan_wallet_name.clone(),
        }
    }

    /// Configuration of the RPC backend
    pub fn rpc_config(&self) -> RpcConfig {
        let auth = match (&self.rpc_cookie, &self.rpc_user, &self.rpc_password) {
            (Some(file), _, _) => Auth::Cookie { file: file.clone() },
            (None, Some(username), Some(password)) => Auth::UserPass {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::None,
        };

        RpcConfig {
            url: self.rpc_url.clone(),
            auth,
            network: self.network,
            timeout_secs: self.rpc_timeout,
        }
    }

    /// Open the backend selected by the options
    pub fn blockchain(&self) -> Result<Box<dyn Blockchain>, Error> {
        match &self.snapshot {
            Some(path) => {
                debug!("reading snapshot {}", path.display());
                Ok(Box::new(MemoryBlockchain::from_file(path)?))
            }
            None => Ok(Box::new(RpcBlockchain::from_config(&self.rpc_config())?)),
        }
    }
}

/// Run the scan described by the command line
///
/// The usage error is reported before connecting to any backend.
pub fn run(opt: &ScanOpt) -> Result<Report, Error> {
    let request = opt.request();
    request.check()?;

    let blockchain = opt.blockchain()?;
    Scanner::new(blockchain.as_ref()).run(&request)
}
