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

use crate::descriptor;

/// Errors that can be thrown while resolving, deriving or scanning a wallet
#[derive(Debug)]
pub enum Error {
    /// Neither a wallet name nor any descriptor was supplied to the scan
    NoWalletOrDescriptor,
    /// The backend doesn't know the requested wallet
    WalletNotFound(String),
    /// The backend returned data that couldn't be interpreted
    InvalidResponse(String),
    /// Generic error
    Generic(String),

    /// Error related to the parsing and usage of descriptors
    Descriptor(descriptor::error::Error),
    /// Miniscript error
    Miniscript(miniscript::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
    /// I/O error while reading a snapshot
    Io(std::io::Error),

    #[cfg(feature = "rpc")]
    /// Rpc client error
    Rpc(bitcoincore_rpc::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWalletOrDescriptor => write!(
                f,
                "Provide either a wallet name or one or more descriptors"
            ),
            Self::WalletNotFound(name) => write!(f, "Wallet `{}` not found", name),
            Self::InvalidResponse(msg) => write!(f, "Invalid backend response: {}", msg),
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::Descriptor(err) => write!(f, "Descriptor error: {}", err),
            Self::Miniscript(err) => write!(f, "Miniscript error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            #[cfg(feature = "rpc")]
            Self::Rpc(err) => write!(f, "RPC client error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(descriptor::error::Error, Descriptor);
impl_error!(miniscript::Error, Miniscript);
impl_error!(serde_json::Error, Json);
impl_error!(std::io::Error, Io);

#[cfg(feature = "rpc")]
impl_error!(bitcoincore_rpc::Error, Rpc);
