// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! IPv4 headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use super::checksum::update_csum64;
use super::cursor::HdrKind;
use super::cursor::RawHeader;
use crate::api::Ipv4Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_SZ: usize = 20;

/// A base IPv4 header. Options are not modeled: the header is always
/// taken to be [`IPV4_HDR_SZ`] bytes regardless of its IHL.
///
/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl RawHeader for Ipv4HdrRaw {
    const KIND: HdrKind = HdrKind::Ipv4;
}

impl Ipv4HdrRaw {
    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }

    /// Compute the header checksum from scratch, ignoring whatever is
    /// currently stored in `csum`.
    pub fn compute_checksum(&self) -> HeaderChecksum {
        let mut csum = Checksum::compute(self.as_bytes());
        csum.sub_bytes(&self.csum);
        HeaderChecksum::from(csum)
    }

    /// Is the stored checksum correct for the current contents?
    pub fn csum_valid(&self) -> bool {
        self.compute_checksum().bytes() == self.csum
    }

    /// Replace the destination address, updating the header checksum
    /// incrementally in the same step.
    pub fn rewrite_dst(&mut self, new: Ipv4Addr) {
        let mut csum = u64::from(u16::from_ne_bytes(self.csum));
        update_csum64(
            &mut csum,
            u32::from_ne_bytes(self.dst),
            u32::from_ne_bytes(new.bytes()),
        );
        self.csum = (csum as u16).to_ne_bytes();
        self.dst = new.bytes();
    }
}
