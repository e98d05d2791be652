// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Bounds-checked header parsing.
//!
//! A [`Cursor`] tracks the current offset into a frame along with the
//! end of the frame. Every header is fixed-size: before handing out a
//! view, the cursor checks that the whole header lies below the end,
//! and only then advances past it. A failed parse leaves the cursor
//! where it was.

use super::ether::EtherHdrRaw;
use super::ether::EtherType;
use super::ip4::Ipv4HdrRaw;
use super::ip6::Ipv6HdrRaw;
use super::tcp::TcpHdrRaw;
use super::token::TokenHdrRaw;
use super::udp::UdpHdrRaw;
use core::fmt;
use core::fmt::Display;
use core::mem::size_of;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// The headers the engine knows how to view.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HdrKind {
    Ether,
    Ipv4,
    Ipv6,
    Udp,
    Tcp,
    Token,
}

impl Display for HdrKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Ether => "Ethernet",
            Self::Ipv4 => "IPv4",
            Self::Ipv6 => "IPv6",
            Self::Udp => "UDP",
            Self::Tcp => "TCP",
            Self::Token => "Token",
        };
        write!(f, "{s}")
    }
}

/// A fixed-size wire header which may be viewed in place.
pub trait RawHeader:
    FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned + Sized
{
    const KIND: HdrKind;
    const SIZE: usize = size_of::<Self>();
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    Truncated { hdr: HdrKind, offset: usize, need: usize, avail: usize },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { hdr, offset, need, avail } => write!(
                f,
                "truncated {hdr} header at offset {offset}: \
                 need {need} bytes, have {avail}",
            ),
        }
    }
}

impl ParseError {
    /// The header that failed to parse.
    pub fn hdr(&self) -> HdrKind {
        match self {
            Self::Truncated { hdr, .. } => *hdr,
        }
    }
}

/// View the header `H` at `offset`.
fn view_at<H: RawHeader>(pkt: &[u8], offset: usize) -> Result<&H, ParseError> {
    let bytes = offset
        .checked_add(H::SIZE)
        .and_then(|end| pkt.get(offset..end))
        .ok_or_else(|| truncated::<H>(offset, pkt.len()))?;

    H::ref_from_bytes(bytes).map_err(|_| truncated::<H>(offset, pkt.len()))
}

/// Mutably view the header `H` at the fixed `offset`, without a cursor.
///
/// Used by the rewrite step, which addresses headers at absolute
/// offsets rather than where the parse left them.
pub fn hdr_at_mut<H: RawHeader>(
    pkt: &mut [u8],
    offset: usize,
) -> Result<&mut H, ParseError> {
    let len = pkt.len();
    let bytes = offset
        .checked_add(H::SIZE)
        .and_then(|end| pkt.get_mut(offset..end))
        .ok_or_else(|| truncated::<H>(offset, len))?;

    H::mut_from_bytes(bytes).map_err(|_| truncated::<H>(offset, len))
}

fn truncated<H: RawHeader>(offset: usize, len: usize) -> ParseError {
    ParseError::Truncated {
        hdr: H::KIND,
        offset,
        need: H::SIZE,
        avail: len.saturating_sub(offset),
    }
}

/// The parse position within a single frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    pos: usize,
    end: usize,
}

impl Cursor {
    /// Start at the beginning of a frame of `end` bytes.
    pub fn new(end: usize) -> Self {
        Self { pos: 0, end }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// View the next header and advance past it.
    ///
    /// The bound is the smaller of the cursor's end and the length of
    /// `pkt`.
    pub fn parse<'a, H: RawHeader>(
        &mut self,
        pkt: &'a [u8],
    ) -> Result<&'a H, ParseError> {
        let end = self.end.min(pkt.len());
        let hdr = view_at::<H>(&pkt[..end], self.pos)?;
        self.pos += H::SIZE;
        Ok(hdr)
    }
}

/// Parse the Ethernet header, returning it with its ethertype.
pub fn parse_ethhdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<(&'a EtherHdrRaw, EtherType), ParseError> {
    let eth = cur.parse::<EtherHdrRaw>(pkt)?;
    Ok((eth, eth.ether_type()))
}

/// Parse the IPv4 header, returning it with its protocol number.
pub fn parse_iphdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<(&'a Ipv4HdrRaw, u8), ParseError> {
    let ip = cur.parse::<Ipv4HdrRaw>(pkt)?;
    Ok((ip, ip.proto))
}

/// Parse the IPv6 header, returning it with its next header.
pub fn parse_ip6hdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<(&'a Ipv6HdrRaw, u8), ParseError> {
    let ip6 = cur.parse::<Ipv6HdrRaw>(pkt)?;
    Ok((ip6, ip6.next_hdr))
}

pub fn parse_udphdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<&'a UdpHdrRaw, ParseError> {
    cur.parse::<UdpHdrRaw>(pkt)
}

pub fn parse_tcphdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<&'a TcpHdrRaw, ParseError> {
    cur.parse::<TcpHdrRaw>(pkt)
}

pub fn parse_tokenhdr<'a>(
    cur: &mut Cursor,
    pkt: &'a [u8],
) -> Result<&'a TokenHdrRaw, ParseError> {
    cur.parse::<TokenHdrRaw>(pkt)
}
