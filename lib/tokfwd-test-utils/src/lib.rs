// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod pcap;

// Let's make our lives easier and pub use a bunch of stuff.
pub use tokfwd::api::DestInfo;
pub use tokfwd::api::Disposition;
pub use tokfwd::api::IPPROTO_ICMP;
pub use tokfwd::api::IPPROTO_TCP;
pub use tokfwd::api::IPPROTO_UDP;
pub use tokfwd::api::Ipv4Addr;
pub use tokfwd::api::MacAddr;
pub use tokfwd::api::RedirectParams;
pub use tokfwd::api::Token;
pub use tokfwd::engine::checksum::Checksum;
pub use tokfwd::engine::ether::ETHER_TYPE_ARP;
pub use tokfwd::engine::ether::ETHER_TYPE_IPV4;
pub use tokfwd::engine::ether::ETHER_TYPE_IPV6;
pub use tokfwd::engine::ether::EtherHdrRaw;
pub use tokfwd::engine::fwd::EGRESS_IDX;
pub use tokfwd::engine::fwd::FwdCfg;
pub use tokfwd::engine::fwd::Forwarder;
pub use tokfwd::engine::fwd::GATEWAY_MAC;
pub use tokfwd::engine::ip4::Ipv4HdrRaw;
pub use tokfwd::engine::ip6::Ipv6HdrRaw;
pub use tokfwd::engine::table::MAC_TABLE_CAP;
pub use tokfwd::engine::table::MacTable;
pub use tokfwd::engine::table::TOKEN_TABLE_CAP;
pub use tokfwd::engine::table::TokenTable;
pub use tokfwd::engine::tcp::TcpHdrRaw;
pub use tokfwd::engine::udp::UdpHdrRaw;

use std::sync::Arc;
use zerocopy::IntoBytes;

/// The client whose frames get redirected.
pub const CLIENT_MAC: MacAddr =
    MacAddr::from_const([0xA8, 0x40, 0x25, 0xF7, 0x00, 0x01]);
/// The MAC of the interface the engine sits on.
pub const NIC_MAC: MacAddr =
    MacAddr::from_const([0xA8, 0x40, 0x25, 0xF7, 0x00, 0x02]);
/// Where redirected frames go next.
pub const NEXT_HOP_MAC: MacAddr =
    MacAddr::from_const([0xA8, 0x40, 0x25, 0xF7, 0x00, 0x63]);

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::from_const([192, 168, 1, 10]);
/// The address clients send to.
pub const FRONT_IP: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 1]);
/// The address a known token is rewritten to.
pub const BACKEND_IP: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 2]);
pub const BACKEND_PORT: u16 = 7777;

pub const CLIENT_PORT: u16 = 40000;
pub const FRONT_PORT: u16 = 7777;

/// A token with an entry in [`tables()`].
pub const KNOWN_TOKEN: Token =
    Token::from_const([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x01]);
/// A token with no entry.
pub const UNKNOWN_TOKEN: Token = Token::from_const([0xFF; 8]);

pub const IPV4_OFF: usize = 14;
pub const L4_OFF: usize = 34;

/// The transport carried by a built frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum L4 {
    /// UDP, with or without a checksum.
    Udp { csum: bool },
    Tcp,
    /// Any other protocol: the token follows the IP header directly.
    Other(u8),
}

/// Build an Ethernet frame with valid checksums.
#[derive(Clone, Debug)]
pub struct FrameBuilder {
    pub eth_src: MacAddr,
    pub eth_dst: MacAddr,
    pub ether_type: u16,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub l4: L4,
    pub token: Option<Token>,
    pub payload: Vec<u8>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self {
            eth_src: CLIENT_MAC,
            eth_dst: NIC_MAC,
            ether_type: ETHER_TYPE_IPV4,
            ip_src: CLIENT_IP,
            ip_dst: FRONT_IP,
            l4: L4::Udp { csum: true },
            token: Some(KNOWN_TOKEN),
            payload: b"hello backend".to_vec(),
        }
    }
}

impl FrameBuilder {
    pub fn udp(token: Token) -> Self {
        Self { token: Some(token), ..Default::default() }
    }

    pub fn tcp() -> Self {
        Self { l4: L4::Tcp, token: None, ..Default::default() }
    }

    pub fn other(proto: u8, token: Token) -> Self {
        Self { l4: L4::Other(proto), token: Some(token), ..Default::default() }
    }

    pub fn ipv6_udp(token: Token) -> Self {
        Self {
            ether_type: ETHER_TYPE_IPV6,
            token: Some(token),
            ..Default::default()
        }
    }

    pub fn arp() -> Self {
        Self {
            ether_type: ETHER_TYPE_ARP,
            token: None,
            payload: vec![0; 28],
            ..Default::default()
        }
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.eth_src = mac;
        self
    }

    pub fn dst_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip_dst = ip;
        self
    }

    pub fn udp_csum(mut self, csum: bool) -> Self {
        self.l4 = L4::Udp { csum };
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Everything behind the IP header.
    fn l4_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(tok) = self.token {
            body.extend_from_slice(&tok.bytes());
        }
        body.extend_from_slice(&self.payload);

        match self.l4 {
            L4::Udp { csum } => {
                let mut udp = UdpHdrRaw {
                    src_port: CLIENT_PORT.to_be_bytes(),
                    dst_port: FRONT_PORT.to_be_bytes(),
                    length: ((8 + body.len()) as u16).to_be_bytes(),
                    csum: [0; 2],
                };
                if csum && self.ether_type == ETHER_TYPE_IPV4 {
                    udp.csum = udp4_csum(
                        self.ip_src,
                        self.ip_dst,
                        udp.as_bytes(),
                        &body,
                    );
                }
                let mut out = udp.as_bytes().to_vec();
                out.extend_from_slice(&body);
                out
            }

            L4::Tcp => {
                let tcp = TcpHdrRaw {
                    src_port: CLIENT_PORT.to_be_bytes(),
                    dst_port: 443u16.to_be_bytes(),
                    seq: 1u32.to_be_bytes(),
                    ack: 0u32.to_be_bytes(),
                    offset: 5 << 4,
                    flags: 0x02,
                    win: 64240u16.to_be_bytes(),
                    csum: [0; 2],
                    urg: [0; 2],
                };
                let mut out = tcp.as_bytes().to_vec();
                out.extend_from_slice(&body);
                out
            }

            L4::Other(_) => body,
        }
    }

    fn proto(&self) -> u8 {
        match self.l4 {
            L4::Udp { .. } => IPPROTO_UDP,
            L4::Tcp => IPPROTO_TCP,
            L4::Other(p) => p,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let eth = EtherHdrRaw {
            dst: self.eth_dst.bytes(),
            src: self.eth_src.bytes(),
            ether_type: self.ether_type.to_be_bytes(),
        };
        let mut pkt = eth.as_bytes().to_vec();

        match self.ether_type {
            ETHER_TYPE_IPV4 => {
                let l4 = self.l4_bytes();
                let mut ip = Ipv4HdrRaw {
                    ver_hdr_len: 0x45,
                    dscp_ecn: 0,
                    total_len: ((20 + l4.len()) as u16).to_be_bytes(),
                    ident: [0x1D, 0xE4],
                    frag_and_flags: [0x40, 0x00],
                    ttl: 64,
                    proto: self.proto(),
                    csum: [0; 2],
                    src: self.ip_src.bytes(),
                    dst: self.ip_dst.bytes(),
                };
                ip.csum = ip.compute_checksum().bytes();
                pkt.extend_from_slice(ip.as_bytes());
                pkt.extend_from_slice(&l4);
            }

            ETHER_TYPE_IPV6 => {
                let l4 = self.l4_bytes();
                let mut src = [0u8; 16];
                src[..2].copy_from_slice(&[0xFD, 0x00]);
                src[12..].copy_from_slice(&self.ip_src.bytes());
                let mut dst = [0u8; 16];
                dst[..2].copy_from_slice(&[0xFD, 0x00]);
                dst[12..].copy_from_slice(&self.ip_dst.bytes());
                let ip6 = Ipv6HdrRaw {
                    vsn_class_flow: [0x60, 0, 0, 0],
                    payload_len: (l4.len() as u16).to_be_bytes(),
                    next_hdr: self.proto(),
                    hop_limit: 64,
                    src,
                    dst,
                };
                pkt.extend_from_slice(ip6.as_bytes());
                pkt.extend_from_slice(&l4);
            }

            _ => pkt.extend_from_slice(&self.payload),
        }

        pkt
    }
}

/// The full UDP-over-IPv4 checksum, as stored in the header.
///
/// `hdr` is the 8-byte UDP header; its checksum field is ignored.
pub fn udp4_csum(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    hdr: &[u8],
    body: &[u8],
) -> [u8; 2] {
    let len = (hdr.len() + body.len()) as u16;
    let mut c = Checksum::compute(&src.bytes());
    c.add_bytes(&dst.bytes());
    c.add_bytes(&[0, IPPROTO_UDP]);
    c.add_bytes(&len.to_be_bytes());
    c.add_bytes(&hdr[..6]);
    c.add_bytes(body);
    let v = !c.finalize();
    if v == 0 { [0xFF, 0xFF] } else { v.to_ne_bytes() }
}

/// Recompute the UDP checksum of an IPv4/UDP frame from scratch.
pub fn recompute_udp_csum(pkt: &[u8]) -> [u8; 2] {
    let src = Ipv4Addr::from([pkt[26], pkt[27], pkt[28], pkt[29]]);
    let dst = Ipv4Addr::from([pkt[30], pkt[31], pkt[32], pkt[33]]);
    udp4_csum(src, dst, &pkt[L4_OFF..L4_OFF + 8], &pkt[L4_OFF + 8..])
}

/// Does the IPv4 header of `pkt` carry a correct checksum?
pub fn ipv4_csum_ok(pkt: &[u8]) -> bool {
    let mut c = Checksum::compute(&pkt[IPV4_OFF..IPV4_OFF + 20]);
    c.finalize() == 0xFFFF
}

/// The stored UDP checksum of an IPv4/UDP frame.
pub fn udp_csum(pkt: &[u8]) -> [u8; 2] {
    [pkt[L4_OFF + 6], pkt[L4_OFF + 7]]
}

/// The IPv4 destination of `pkt`.
pub fn ipv4_dst(pkt: &[u8]) -> Ipv4Addr {
    Ipv4Addr::from([pkt[30], pkt[31], pkt[32], pkt[33]])
}

/// The standard tables: [`CLIENT_MAC`] redirects to [`NEXT_HOP_MAC`],
/// and [`KNOWN_TOKEN`] resolves to [`BACKEND_IP`]:[`BACKEND_PORT`].
pub fn tables() -> (Arc<MacTable>, Arc<TokenTable>) {
    let macs = Arc::new(MacTable::new("redirect_params", MAC_TABLE_CAP));
    macs.set(CLIENT_MAC, RedirectParams::from(NEXT_HOP_MAC)).unwrap();

    let tokens = Arc::new(TokenTable::new("forward_params", TOKEN_TABLE_CAP));
    tokens
        .set(KNOWN_TOKEN, DestInfo::new(BACKEND_IP, BACKEND_PORT))
        .unwrap();

    (macs, tokens)
}

/// An engine over the standard tables and default config.
pub fn forwarder(name: &str) -> Forwarder<Arc<MacTable>, Arc<TokenTable>> {
    let (macs, tokens) = tables();
    Forwarder::new(name, FwdCfg::default(), macs, tokens).unwrap()
}

/// Assert that `after` differs from `before` only within `ranges`.
#[track_caller]
pub fn assert_only_changed(
    before: &[u8],
    after: &[u8],
    ranges: &[core::ops::Range<usize>],
) {
    assert_eq!(before.len(), after.len(), "frame length changed");
    for (i, (b, a)) in before.iter().zip(after).enumerate() {
        if b != a {
            assert!(
                ranges.iter().any(|r| r.contains(&i)),
                "byte {i} changed: {b:#04x} -> {a:#04x}"
            );
        }
    }
}
