// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Scan pipeline
//!
//! A [`Scanner`] resolves the descriptors of a wallet, derives the owned addresses, reads the
//! history the backend reports for them and runs every detector over the resulting
//! [`TxGraph`].
//!
//! ## Example
//!
//! ```
//! # use privacy_audit::{MemoryBlockchain, Scanner, ScanRequest};
//! # use privacy_audit::bitcoin::Network;
//! let blockchain = MemoryBlockchain::new(Network::Regtest);
//! let request = ScanRequest {
//!     descriptors: vec!["wpkh(tpubD6NzVbkrYhZ4XHndKkuB8FifXm8r5FQHwrN6oZuWCz13qb93rtgKvD4PQsqC4HP4yhV3tA2fqr2RbY5mNXfM7RxXUoeABoDtsFUq2zJq6YK/0/*)".to_string()],
//!     ..Default::default()
//! };
//!
//! // the snapshot has no `_detect_scan` wallet, so the history is empty
//! let report = Scanner::new(&blockchain).run(&request)?;
//! assert!(report.is_clean());
//! assert_eq!(report.stats.descriptors, 2);
//! # Ok::<(), privacy_audit::Error>(())
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::blockchain::Blockchain;
use crate::descriptor::{derive_all_addresses, resolve_descriptors, DescriptorSpec};
use crate::detect::{self, Labels};
use crate::error::Error;
use crate::graph::{TxCache, TxGraph};
use crate::report::{Report, Stats};

/// Name of the watch-only wallet provisioned for raw descriptors
pub const DEFAULT_SCAN_WALLET: &str = "_detect_scan";

fn default_scan_wallet() -> String {
    DEFAULT_SCAN_WALLET.to_string()
}

/// Parameters of a scan
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Wallet whose descriptors and history are analyzed
    #[serde(default)]
    pub wallet: Option<String>,
    /// Raw descriptors, used when no wallet is given
    #[serde(default)]
    pub descriptors: Vec<String>,
    /// Wallets whose transactions taint the coins they fund
    #[serde(default)]
    pub known_risky_wallets: Vec<String>,
    /// Wallets of known exchanges
    #[serde(default)]
    pub known_exchange_wallets: Vec<String>,
    /// Leave the provisioned scan wallet loaded after the scan
    #[serde(default)]
    pub keep_scan_wallet: bool,
    /// Name of the provisioned scan wallet
    #[serde(default = "default_scan_wallet")]
    pub scan_wallet_name: String,
}

impl Default for ScanRequest {
    fn default() -> Self {
        ScanRequest {
            wallet: None,
            descriptors: Vec::new(),
            known_risky_wallets: Vec::new(),
            known_exchange_wallets: Vec::new(),
            keep_scan_wallet: false,
            scan_wallet_name: default_scan_wallet(),
        }
    }
}

/// Runs the whole analysis against a backend
pub struct Scanner<'a> {
    blockchain: &'a dyn Blockchain,
}

impl ScanRequest {
    /// Name of the wallet to analyze, an empty name counts as none
    pub fn wallet_name(&self) -> Option<&str> {
        self.wallet.as_deref().filter(|w| !w.is_empty())
    }

    /// Fail with [`Error::NoWalletOrDescriptor`] if there is nothing to analyze
    pub fn check(&self) -> Result<(), Error> {
        if self.wallet_name().is_none() && self.descriptors.is_empty() {
            return Err(Error::NoWalletOrDescriptor);
        }

        Ok(())
    }
}

impl<'a> std::fmt::Debug for Scanner<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").finish()
    }
}

impl<'a> Scanner<'a> {
    /// Create a scanner on top of a backend
    pub fn new(blockchain: &'a dyn Blockchain) -> Self {
        Scanner { blockchain }
    }

    /// Run a scan
    ///
    /// Only the usage error, [`Error::NoWalletOrDescriptor`], is returned: every other failure
    /// of the backend shrinks the analyzed data instead.
    pub fn run(&self, request: &ScanRequest) -> Result<Report, Error> {
        request.check()?;
        let wallet = request.wallet_name();

        let descriptors = resolve_descriptors(self.blockchain, wallet, &request.descriptors)?;
        info!("Descriptors: {}", descriptors.len());

        let provisioned = match wallet {
            Some(_) => None,
            None => self.provision(&request.scan_wallet_name, &descriptors),
        };
        let history_wallet = wallet.or_else(|| provisioned.as_deref());

        let report = self.analyze(request, &descriptors, history_wallet);

        if let Some(name) = provisioned {
            if request.keep_scan_wallet {
                info!("Keeping scan wallet `{}` loaded", name);
            } else if let Err(e) = self.blockchain.unload_wallet(&name) {
                warn!("Can't unload scan wallet `{}`: {}", name, e);
            }
        }

        Ok(report)
    }

    fn provision(&self, name: &str, descriptors: &[DescriptorSpec]) -> Option<String> {
        match self.blockchain.create_watch_wallet(name, descriptors) {
            Ok(wallet) => {
                info!("Scan wallet `{}` ready", wallet);
                Some(wallet)
            }
            Err(e) => {
                warn!("Can't provision scan wallet `{}`: {}", name, e);
                None
            }
        }
    }

    fn analyze(
        &self,
        request: &ScanRequest,
        descriptors: &[DescriptorSpec],
        wallet: Option<&str>,
    ) -> Report {
        let addresses = derive_all_addresses(self.blockchain, descriptors);

        let (history, utxos) = match wallet {
            Some(wallet) => {
                let history = self.blockchain.list_transactions(wallet).unwrap_or_else(|e| {
                    warn!("Can't list the history of `{}`: {}", wallet, e);
                    Vec::new()
                });
                let utxos = self.blockchain.list_unspent(wallet).unwrap_or_else(|e| {
                    warn!("Can't list the UTXOs of `{}`: {}", wallet, e);
                    Vec::new()
                });
                (history, utxos)
            }
            None => (Vec::new(), Vec::new()),
        };
        info!("History entries: {}, UTXOs: {}", history.len(), utxos.len());

        let mut stats = Stats {
            addresses_derived: addresses.len(),
            transactions_analyzed: 0,
            descriptors: descriptors.len(),
        };
        if history.is_empty() {
            info!("No transactions found for these descriptors");
            return Report::empty(stats);
        }

        let graph = TxGraph::new(addresses, history, utxos, TxCache::new(self.blockchain));
        graph.prefetch();
        stats.transactions_analyzed = graph.owned_txids().len();

        let labels = Labels::load(
            self.blockchain,
            &request.known_risky_wallets,
            &request.known_exchange_wallets,
        );

        Report::aggregate(stats, detect::run_all(&graph, &labels))
    }
}
