// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Forwarding-table values and the control-plane rule records that
//! populate them.

use super::Ipv4Addr;
use super::MacAddr;
use super::Token;
use alloc::string::String;
use alloc::string::ToString;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Where frames carrying a given token are sent.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct DestInfo {
    pub daddr: Ipv4Addr,
    pub dport: u16,
}

impl DestInfo {
    /// Size of the value as stored in the token table:
    /// `{ daddr: u32, dport: u16, padding: u16 }`.
    pub const WIRE_LEN: usize = 8;

    pub fn new(daddr: Ipv4Addr, dport: u16) -> Self {
        Self { daddr, dport }
    }

    /// The table image of this value. Both the address and the port
    /// are kept in network order; the padding is zero.
    pub fn to_wire(&self) -> [u8; Self::WIRE_LEN] {
        let a = self.daddr.bytes();
        let p = self.dport.to_be_bytes();
        [a[0], a[1], a[2], a[3], p[0], p[1], 0, 0]
    }

    pub fn from_wire(raw: [u8; Self::WIRE_LEN]) -> Self {
        Self {
            daddr: Ipv4Addr::from([raw[0], raw[1], raw[2], raw[3]]),
            dport: u16::from_be_bytes([raw[4], raw[5]]),
        }
    }
}

impl Display for DestInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.daddr, self.dport)
    }
}

/// The egress destination MAC used when a frame is redirected.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct RedirectParams {
    pub dst_mac: MacAddr,
}

impl From<MacAddr> for RedirectParams {
    fn from(dst_mac: MacAddr) -> Self {
        Self { dst_mac }
    }
}

/// A backend server rule as submitted by the control plane.
///
/// All fields are strings, as they arrive in the rule documents:
/// `[{"token": "0011223344556677", "gsaddress": "10.0.0.2",
/// "gsport": "7777"}]`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BackendServer {
    /// The token, hex encoded.
    pub token: String,
    #[serde(rename = "gsaddress")]
    pub gs_addr: String,
    #[serde(rename = "gsport")]
    pub gs_port: String,
}

impl BackendServer {
    /// Validate the rule and produce the token-table entry it
    /// describes.
    pub fn to_entry(&self) -> Result<(Token, DestInfo), String> {
        let token = self
            .token
            .parse::<Token>()
            .map_err(|e| format!("bad token {:?}: {e}", self.token))?;
        let daddr = self
            .gs_addr
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("bad address {:?}: {e}", self.gs_addr))?;
        let dport = self
            .gs_port
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("bad port {:?}: {e}", self.gs_port))?;

        Ok((token, DestInfo { daddr, dport }))
    }
}

impl From<(Token, DestInfo)> for BackendServer {
    fn from((token, dest): (Token, DestInfo)) -> Self {
        Self {
            token: token.to_string(),
            gs_addr: dest.daddr.to_string(),
            gs_port: dest.dport.to_string(),
        }
    }
}
