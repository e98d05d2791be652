// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The token header.
//!
//! An opaque 8-byte key carried directly behind the transport header.
//! The bytes are used verbatim as the forwarding table key.

use super::cursor::HdrKind;
use super::cursor::RawHeader;
use crate::api::TOKEN_LEN;
use crate::api::Token;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const TOKEN_HDR_SZ: usize = TOKEN_LEN;

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct TokenHdrRaw {
    pub token: [u8; TOKEN_LEN],
}

impl RawHeader for TokenHdrRaw {
    const KIND: HdrKind = HdrKind::Token;
}

impl TokenHdrRaw {
    pub fn token(&self) -> Token {
        Token::from(self.token)
    }
}
