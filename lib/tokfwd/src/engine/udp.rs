// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! UDP headers.

use super::checksum::csum16_add;
use super::cursor::HdrKind;
use super::cursor::RawHeader;
use crate::api::Ipv4Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const UDP_HDR_SZ: usize = 8;

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct UdpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub length: [u8; 2],
    pub csum: [u8; 2],
}

impl RawHeader for UdpHdrRaw {
    const KIND: HdrKind = HdrKind::Udp;
}

impl UdpHdrRaw {
    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }

    pub fn len(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }

    /// Update the checksum for a change of one IPv4 address in the
    /// pseudo-header.
    ///
    /// The address is folded in as two 16-bit words. A zero checksum
    /// means the sender did not compute one and is left alone; a
    /// computed zero is sent as all ones (RFC 768).
    pub fn update_csum_for_addr(&mut self, old: Ipv4Addr, new: Ipv4Addr) {
        let check = u16::from_ne_bytes(self.csum);
        if check == 0 {
            return;
        }

        let (o, n) = (old.bytes(), new.bytes());
        let (m0, m1) =
            (u16::from_ne_bytes([o[0], o[1]]), u16::from_ne_bytes([o[2], o[3]]));
        let (n0, n1) =
            (u16::from_ne_bytes([n[0], n[1]]), u16::from_ne_bytes([n[2], n[3]]));

        let mut c = !csum16_add(csum16_add(!check, !m0), n0);
        c = !csum16_add(csum16_add(!c, !m1), n1);

        if c == 0 {
            c = 0xFFFF;
        }

        self.csum = c.to_ne_bytes();
    }
}
