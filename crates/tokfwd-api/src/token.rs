// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The opaque token carried by the custom header.

use alloc::string::String;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

pub const TOKEN_LEN: usize = 8;

/// An 8-byte token.
///
/// The bytes are kept exactly as they appear on the wire and are used
/// verbatim as the forwarding-table key; no byte order is imposed.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Token {
    inner: [u8; TOKEN_LEN],
}

impl Token {
    #[inline]
    pub fn bytes(&self) -> [u8; TOKEN_LEN] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; TOKEN_LEN]) -> Self {
        Self { inner: bytes }
    }
}

impl From<[u8; TOKEN_LEN]> for Token {
    fn from(bytes: [u8; TOKEN_LEN]) -> Self {
        Self { inner: bytes }
    }
}

impl From<Token> for [u8; TOKEN_LEN] {
    fn from(token: Token) -> Self {
        token.inner
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

/// Tokens are written as 16 hex digits, most significant (first wire)
/// byte first.
impl FromStr for Token {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_ascii() {
            return Err(format!("token is not hex: {s}"));
        }

        if s.len() != TOKEN_LEN * 2 {
            return Err(format!(
                "token must be {} hex digits, got {}",
                TOKEN_LEN * 2,
                s.len()
            ));
        }

        let mut inner = [0u8; TOKEN_LEN];
        for (i, byte) in inner.iter_mut().enumerate() {
            let pair = &s[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| format!("bad token byte: {pair}"))?;
        }

        Ok(Self { inner })
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.inner {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Token({self})")
    }
}
