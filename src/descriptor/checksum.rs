// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Descriptor checksum
//!
//! This module contains a re-implementation of the function used by Bitcoin Core to calculate the
//! checksum of a descriptor, plus the helpers used to strip it from user-supplied strings.

use log::warn;

use crate::descriptor::error::Error;

const INPUT_CHARSET: &str = "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";
const CHECKSUM_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const GENERATORS: [u64; 5] = [
    0xf5dee51989,
    0xa9fdca3312,
    0x1bab10e32d,
    0x3706b1677a,
    0x644d626ffd,
];

fn poly_mod(c: u64, val: u64) -> u64 {
    let top = c >> 35;
    GENERATORS
        .iter()
        .enumerate()
        .filter(|(bit, _)| top & (1u64 << *bit) != 0)
        .fold(((c & 0x7ffffffff) << 5) ^ val, |acc, (_, g)| acc ^ g)
}

/// Compute the checksum of a descriptor body (without any `#` suffix)
pub fn calc_checksum(desc: &str) -> Result<String, Error> {
    let mut c = 1;
    let mut groups = Vec::with_capacity(3);
    for ch in desc.chars() {
        let pos = INPUT_CHARSET
            .find(ch)
            .ok_or(Error::InvalidDescriptorCharacter(ch))? as u64;
        c = poly_mod(c, pos & 31);
        groups.push(pos >> 5);
        if groups.len() == 3 {
            c = poly_mod(c, groups[0] * 9 + groups[1] * 3 + groups[2]);
            groups.clear();
        }
    }
    if !groups.is_empty() {
        let cls = groups.iter().fold(0, |acc, g| acc * 3 + g);
        c = poly_mod(c, cls);
    }
    for _ in 0..8 {
        c = poly_mod(c, 0);
    }
    c ^= 1;

    Ok((0..8)
        .map(|j| CHECKSUM_CHARSET[((c >> (5 * (7 - j))) & 31) as usize] as char)
        .collect())
}

/// Split a descriptor into its body and the checksum that was appended to it, if any
pub fn split_checksum(desc: &str) -> (&str, Option<&str>) {
    match desc.find('#') {
        Some(pos) => (&desc[..pos], Some(&desc[pos + 1..])),
        None => (desc, None),
    }
}

/// Return the descriptor body, verifying the appended checksum when there is one
pub fn verified_body(desc: &str) -> Result<&str, Error> {
    let (body, checksum) = split_checksum(desc);
    if let Some(checksum) = checksum {
        if calc_checksum(body)? != checksum {
            return Err(Error::InvalidDescriptorChecksum);
        }
    }

    Ok(body)
}

/// Strip the checksum from a user-supplied descriptor
///
/// A checksum that doesn't match is only logged: the body is what gets resolved and canonicalized
/// afterwards, so a stale checksum must not prevent the scan.
pub fn strip_checksum(desc: &str) -> &str {
    match verified_body(desc) {
        Ok(body) => body,
        Err(e) => {
            warn!("Ignoring checksum of `{}`: {}", desc, e);
            split_checksum(desc).0
        }
    }
}

/// Append the checksum to a descriptor body
pub fn with_checksum(desc: &str) -> Result<String, Error> {
    let body = split_checksum(desc).0;
    Ok(format!("{}#{}", body, calc_checksum(body)?))
}
