// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A privacy audit for descriptor based Bitcoin wallets.
//!
//! The library answers a single question: given the addresses a wallet controls, derived from
//! its output descriptors, what privacy leaks does its on-chain history expose?
//!
//! A scan goes through the following stages:
//!
//! 1. the [descriptors](descriptor) of the wallet are resolved, completing a lone receive or
//!    change branch with its mirror;
//! 2. the owned addresses are derived from them, this set is the only definition of ownership;
//! 3. the wallet history and UTXOs are indexed in a [`TxGraph`](graph::TxGraph), which decodes
//!    each transaction at most once;
//! 4. twelve independent [detectors](detect) run in parallel over the graph;
//! 5. their findings are collected, in a fixed order, into a [`Report`].
//!
//! The node side is abstracted by the [`Blockchain`] trait. [`MemoryBlockchain`] serves a JSON
//! snapshot and is used throughout the tests, while with the `rpc` feature
//! [`RpcBlockchain`](blockchain::RpcBlockchain) talks to Bitcoin Core.
//!
//! ## Example
//!
//! ```no_run
//! use privacy_audit::{MemoryBlockchain, ScanRequest, Scanner};
//!
//! let blockchain = MemoryBlockchain::from_file("snapshot.json")?;
//! let request = ScanRequest {
//!     wallet: Some("alice".to_string()),
//!     ..Default::default()
//! };
//!
//! let report = Scanner::new(&blockchain).run(&request)?;
//! for finding in &report.findings {
//!     println!("[{}] {}", finding.severity, finding.description);
//! }
//! # Ok::<(), privacy_audit::Error>(())
//! ```
//!
//! # Feature flags
//!
//! * `rpc`: enables the Bitcoin Core backend
//! * `cli-utils`: builds the `privacy-audit` command line tool

pub extern crate bitcoin;
pub extern crate miniscript;

#[cfg(feature = "rpc")]
pub extern crate bitcoincore_rpc;

#[macro_use]
pub(crate) mod error;
pub mod blockchain;
pub mod descriptor;
pub mod detect;
pub mod graph;
pub mod report;
pub mod scan;
pub mod types;

#[cfg(feature = "cli-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli-utils")))]
pub mod cli;

#[cfg(test)]
pub(crate) mod testutils;

pub use blockchain::{Blockchain, ListedDescriptor, MemoryBlockchain, Snapshot};
pub use descriptor::{AddressMap, DerivedAddress, DescriptorSpec};
pub use detect::{Details, Finding, FindingKind, Labels, Severity};
pub use error::Error;
pub use graph::TxGraph;
pub use report::{Report, Stats, Summary};
pub use scan::{ScanRequest, Scanner};
pub use types::*;
