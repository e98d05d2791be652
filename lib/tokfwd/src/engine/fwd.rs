// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The decision engine.
//!
//! Each frame is walked once, front to back:
//!
//! ```text
//! Ethernet -> IPv4 | IPv6 -> UDP | TCP | other -> Token -> rewrite
//! ```
//!
//! * A non-IP ethertype is passed untouched.
//!
//! * TCP is always passed untouched.
//!
//! * UDP is only considered when its source MAC is in the redirect
//!   table. On a hit the MACs are rewritten and the frame is tentatively
//!   redirected; on a miss it is passed untouched.
//!
//! * Any other protocol goes straight to the token header, which sits
//!   directly behind the IP header.
//!
//! * A token with no forwarding entry drops the frame, even when the
//!   MACs were already rewritten.
//!
//! * A token hit rewrites the IPv4 destination and both checksums that
//!   cover it. The IPv4 and UDP headers are addressed at fixed offsets,
//!   so frames are assumed to be untagged and IPv4.
//!
//! Any header that does not fit in the frame aborts it.

use super::cursor::Cursor;
use super::cursor::HdrKind;
use super::cursor::ParseError;
use super::cursor::RawHeader;
use super::cursor::hdr_at_mut;
use super::cursor::parse_ethhdr;
use super::cursor::parse_ip6hdr;
use super::cursor::parse_iphdr;
use super::cursor::parse_tcphdr;
use super::cursor::parse_tokenhdr;
use super::cursor::parse_udphdr;
use super::ether::ETHER_HDR_SZ;
use super::ether::EtherHdrRaw;
use super::ether::EtherType;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::Ipv4HdrRaw;
use super::stat::DispositionStats;
use super::stat::DispositionStatsSnap;
use super::table::Lookup;
use super::udp::UdpHdrRaw;
use crate::api::DestInfo;
use crate::api::Disposition;
use crate::api::IPPROTO_TCP;
use crate::api::IPPROTO_UDP;
use crate::api::MacAddr;
use crate::api::RedirectParams;
use crate::api::Token;
use crate::ddi::kstat;
use crate::ddi::kstat::KStatNamed;
use crate::ddi::kstat::KStatProvider;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The source MAC written into every redirected frame.
pub const GATEWAY_MAC: MacAddr =
    MacAddr::from_const([0x42, 0x01, 0xC0, 0xA8, 0x01, 0x04]);

/// The egress index redirected frames are sent to.
pub const EGRESS_IDX: u32 = 0;

pub const IPV4_REWRITE_OFFSET: usize = ETHER_HDR_SZ;
pub const UDP_REWRITE_OFFSET: usize = ETHER_HDR_SZ + IPV4_HDR_SZ;

/// The module name engine stats are registered under.
pub const STATS_MODULE: &str = "tokfwd";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FwdCfg {
    pub gateway_mac: MacAddr,
    pub egress_idx: u32,
}

impl Default for FwdCfg {
    fn default() -> Self {
        Self { gateway_mac: GATEWAY_MAC, egress_idx: EGRESS_IDX }
    }
}

/// Why a frame was aborted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessError {
    Parse(ParseError),
    /// A fixed-offset header used by the rewrite lies past the end of
    /// the frame.
    RewriteOverrun { hdr: HdrKind, offset: usize },
}

impl From<ParseError> for ProcessError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::RewriteOverrun { hdr, offset } => {
                write!(f, "{hdr} rewrite at offset {offset} overruns frame")
            }
        }
    }
}

/// Decide the fate of a single frame, rewriting it in place as needed.
///
/// The returned disposition is never [`Disposition::Aborted`]; an
/// abort is reported as the error that caused it.
pub fn classify<M, T>(
    cfg: &FwdCfg,
    mac_tbl: &M,
    token_tbl: &T,
    pkt: &mut [u8],
) -> Result<Disposition, ProcessError>
where
    M: Lookup<MacAddr, RedirectParams>,
    T: Lookup<Token, DestInfo>,
{
    let mut disp = Disposition::Pass;
    let mut cur = Cursor::new(pkt.len());

    let (eth, ether_type) = parse_ethhdr(&mut cur, pkt)?;
    let src_mac = eth.src();

    let proto = match ether_type {
        EtherType::Ipv4 => parse_iphdr(&mut cur, pkt)?.1,
        EtherType::Ipv6 => parse_ip6hdr(&mut cur, pkt)?.1,
        _ => return Ok(Disposition::Pass),
    };

    match proto {
        IPPROTO_UDP => {
            parse_udphdr(&mut cur, pkt)?;

            let Some(redirect) = mac_tbl.lookup(&src_mac) else {
                return Ok(Disposition::Pass);
            };

            let eth = hdr_at_mut::<EtherHdrRaw>(pkt, 0)?;
            eth.set_src(cfg.gateway_mac);
            eth.set_dst(redirect.dst_mac);
            disp = Disposition::Redirect { egress: cfg.egress_idx };
        }

        // The parse only steps over the header; its outcome does not
        // change the disposition.
        IPPROTO_TCP => {
            let _ = parse_tcphdr(&mut cur, pkt);
            return Ok(Disposition::Pass);
        }

        _ => (),
    }

    let token = parse_tokenhdr(&mut cur, pkt)?.token();

    let Some(dest) = token_tbl.lookup(&token) else {
        return Ok(Disposition::Drop);
    };

    rewrite(pkt, &dest)?;
    Ok(disp)
}

fn check_fits<H: RawHeader>(
    pkt: &[u8],
    offset: usize,
) -> Result<(), ProcessError> {
    if pkt.len() < offset + H::SIZE {
        return Err(ProcessError::RewriteOverrun { hdr: H::KIND, offset });
    }

    Ok(())
}

/// Point the frame at `dest`.
///
/// Both headers are bounds checked before either is touched, so an
/// overrun leaves the L3/L4 bytes as they were.
fn rewrite(pkt: &mut [u8], dest: &DestInfo) -> Result<(), ProcessError> {
    check_fits::<Ipv4HdrRaw>(pkt, IPV4_REWRITE_OFFSET)?;
    check_fits::<UdpHdrRaw>(pkt, UDP_REWRITE_OFFSET)?;

    let ip = hdr_at_mut::<Ipv4HdrRaw>(pkt, IPV4_REWRITE_OFFSET)?;
    let old = ip.dst();
    ip.rewrite_dst(dest.daddr);

    let udp = hdr_at_mut::<UdpHdrRaw>(pkt, UDP_REWRITE_OFFSET)?;
    udp.update_csum_for_addr(old, dest.daddr);

    Ok(())
}

/// One engine instance.
///
/// A host runs one `Forwarder` per receive queue. Instances share the
/// tables (typically as `Arc<FwdTable>`) but each owns its counters,
/// which is why [`Self::process()`] takes `&mut self`.
pub struct Forwarder<M, T> {
    cfg: FwdCfg,
    mac_tbl: M,
    token_tbl: T,
    stats: KStatNamed<DispositionStats>,
}

impl<M, T> Forwarder<M, T>
where
    M: Lookup<MacAddr, RedirectParams>,
    T: Lookup<Token, DestInfo>,
{
    pub fn new(
        name: &str,
        cfg: FwdCfg,
        mac_tbl: M,
        token_tbl: T,
    ) -> Result<Self, kstat::Error> {
        let stats =
            KStatNamed::new(STATS_MODULE, name, DispositionStats::new())?;
        Ok(Self { cfg, mac_tbl, token_tbl, stats })
    }

    pub fn cfg(&self) -> &FwdCfg {
        &self.cfg
    }

    pub fn name(&self) -> &str {
        self.stats.name()
    }

    /// Process one frame, returning the disposition to hand back to
    /// the host.
    #[inline]
    pub fn process(&mut self, pkt: &mut [u8]) -> Disposition {
        self.try_process(pkt).unwrap_or(Disposition::Aborted)
    }

    /// Like [`Self::process()`], but an aborted frame is returned as
    /// the error that aborted it. Stats are recorded either way.
    pub fn try_process(
        &mut self,
        pkt: &mut [u8],
    ) -> Result<Disposition, ProcessError> {
        let len = pkt.len();
        let res = classify(&self.cfg, &self.mac_tbl, &self.token_tbl, pkt);

        match res {
            Ok(disp) => Ok(self.stats.vals.record(disp, len)),

            Err(e) => {
                self.stats.vals.record_abort(&e);
                self.stats.vals.record(Disposition::Aborted, len);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> DispositionStatsSnap {
        self.stats.vals.snapshot()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::IPPROTO_ICMP;
    use crate::api::Ipv4Addr;
    use crate::engine::checksum::Checksum;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    const CLIENT_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x01];
    const NIC_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x02];
    const NEXT_HOP: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x63];
    const TOKEN: [u8; 8] = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x01];
    const OLD_DST: [u8; 4] = [10, 0, 0, 1];
    const NEW_DST: [u8; 4] = [10, 0, 0, 2];

    type Macs = BTreeMap<MacAddr, RedirectParams>;
    type Tokens = BTreeMap<Token, DestInfo>;

    fn tables() -> (Macs, Tokens) {
        let mut macs = Macs::new();
        macs.insert(
            MacAddr::from(CLIENT_MAC),
            RedirectParams::from(MacAddr::from(NEXT_HOP)),
        );

        let mut toks = Tokens::new();
        toks.insert(
            Token::from(TOKEN),
            DestInfo::new(Ipv4Addr::from(NEW_DST), 7777),
        );

        (macs, toks)
    }

    // Ethernet + IPv4 + UDP + token + payload, checksums filled in.
    fn udp_frame(token: [u8; 8], udp_csum: bool) -> Vec<u8> {
        let payload = b"ping";
        let udp_len = 8 + token.len() + payload.len();
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&NIC_MAC);
        pkt.extend_from_slice(&CLIENT_MAC);
        pkt.extend_from_slice(&[0x08, 0x00]);

        let total = (20 + udp_len) as u16;
        pkt.extend_from_slice(&[0x45, 0x00]);
        pkt.extend_from_slice(&total.to_be_bytes());
        pkt.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 64, IPPROTO_UDP]);
        pkt.extend_from_slice(&[0, 0]);
        pkt.extend_from_slice(&[192, 168, 1, 10]);
        pkt.extend_from_slice(&OLD_DST);
        let csum = hdr_at_mut::<Ipv4HdrRaw>(&mut pkt, 14)
            .unwrap()
            .compute_checksum();
        pkt[24..26].copy_from_slice(&csum.bytes());

        pkt.extend_from_slice(&40000u16.to_be_bytes());
        pkt.extend_from_slice(&7777u16.to_be_bytes());
        pkt.extend_from_slice(&(udp_len as u16).to_be_bytes());
        pkt.extend_from_slice(&[0, 0]);
        pkt.extend_from_slice(&token);
        pkt.extend_from_slice(payload);

        if udp_csum {
            let csum = full_udp_csum(&pkt);
            pkt[40..42].copy_from_slice(&csum);
        }

        pkt
    }

    fn full_udp_csum(pkt: &[u8]) -> [u8; 2] {
        let mut c = Checksum::compute(&pkt[26..34]);
        c.add_bytes(&[0, IPPROTO_UDP]);
        c.add_bytes(&pkt[38..40]);
        c.add_bytes(&pkt[34..40]);
        c.add_bytes(&pkt[42..]);
        let v = !c.finalize();
        if v == 0 { [0xFF, 0xFF] } else { v.to_ne_bytes() }
    }

    fn ip_csum_ok(pkt: &[u8]) -> bool {
        let mut c = Checksum::compute(&pkt[14..34]);
        c.finalize() == 0xFFFF
    }

    fn run(pkt: &mut [u8]) -> Result<Disposition, ProcessError> {
        let (macs, toks) = tables();
        classify(&FwdCfg::default(), &macs, &toks, pkt)
    }

    #[test]
    fn full_rewrite() {
        let mut pkt = udp_frame(TOKEN, true);
        let orig = pkt.clone();
        assert_eq!(run(&mut pkt), Ok(Disposition::Redirect { egress: 0 }));

        assert_eq!(&pkt[0..6], &NEXT_HOP);
        assert_eq!(&pkt[6..12], &GATEWAY_MAC.bytes());
        assert_eq!(&pkt[30..34], &NEW_DST);
        assert!(ip_csum_ok(&pkt));
        assert_eq!(&pkt[40..42], &full_udp_csum(&pkt));

        // Nothing else moved, including the destination port.
        for (i, (a, b)) in orig.iter().zip(&pkt).enumerate() {
            let rewritten = i < 12
                || (24..26).contains(&i)
                || (30..34).contains(&i)
                || (40..42).contains(&i);
            if !rewritten {
                assert_eq!(a, b, "byte {i}");
            }
        }
    }

    #[test]
    fn zero_udp_csum_stays_zero() {
        let mut pkt = udp_frame(TOKEN, false);
        assert_eq!(run(&mut pkt), Ok(Disposition::Redirect { egress: 0 }));
        assert_eq!(&pkt[40..42], &[0, 0]);
        assert!(ip_csum_ok(&pkt));
    }

    #[test]
    fn mac_miss_passes_untouched() {
        let mut pkt = udp_frame(TOKEN, true);
        pkt[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        let orig = pkt.clone();
        assert_eq!(run(&mut pkt), Ok(Disposition::Pass));
        assert_eq!(pkt, orig);
    }

    #[test]
    fn token_miss_drops_after_mac_rewrite() {
        let mut pkt = udp_frame([0xFF; 8], true);
        let orig = pkt.clone();
        assert_eq!(run(&mut pkt), Ok(Disposition::Drop));
        assert_eq!(&pkt[0..6], &NEXT_HOP);
        assert_eq!(&pkt[6..12], &GATEWAY_MAC.bytes());
        assert_eq!(&pkt[12..], &orig[12..]);
    }

    #[test]
    fn token_truncated_aborts() {
        let mut pkt = udp_frame(TOKEN, true);
        pkt.truncate(46);
        assert!(matches!(
            run(&mut pkt),
            Err(ProcessError::Parse(ParseError::Truncated {
                hdr: HdrKind::Token,
                offset: 42,
                ..
            }))
        ));
    }

    #[test]
    fn tcp_passes() {
        let mut pkt = udp_frame(TOKEN, true);
        pkt[23] = IPPROTO_TCP;
        let orig = pkt.clone();
        assert_eq!(run(&mut pkt), Ok(Disposition::Pass));
        assert_eq!(pkt, orig);

        // Even when the TCP header is cut short.
        pkt.truncate(40);
        assert_eq!(run(&mut pkt), Ok(Disposition::Pass));
    }

    #[test]
    fn other_proto_token_after_l3() {
        // ICMP with the token straight after the IPv4 header.
        let mut pkt = udp_frame(TOKEN, false);
        pkt[23] = IPPROTO_ICMP;
        pkt[34..42].copy_from_slice(&TOKEN);
        let csum = hdr_at_mut::<Ipv4HdrRaw>(&mut pkt, 14)
            .unwrap()
            .compute_checksum();
        pkt[24..26].copy_from_slice(&csum.bytes());

        assert_eq!(run(&mut pkt), Ok(Disposition::Pass));
        assert_eq!(&pkt[30..34], &NEW_DST);
        assert!(ip_csum_ok(&pkt));
        // MACs untouched.
        assert_eq!(&pkt[0..6], &NIC_MAC);

        // And an unknown token drops it.
        let mut pkt = udp_frame(TOKEN, false);
        pkt[23] = IPPROTO_ICMP;
        assert_eq!(run(&mut pkt), Ok(Disposition::Drop));
    }

    #[test]
    fn non_ip_passes() {
        let mut pkt = udp_frame(TOKEN, true);
        pkt[12..14].copy_from_slice(&[0x08, 0x06]);
        let orig = pkt.clone();
        assert_eq!(run(&mut pkt), Ok(Disposition::Pass));
        assert_eq!(pkt, orig);
    }

    #[test]
    fn short_frames_abort() {
        for len in [0, 1, 13] {
            let mut pkt = udp_frame(TOKEN, true);
            pkt.truncate(len);
            assert!(matches!(
                run(&mut pkt),
                Err(ProcessError::Parse(ParseError::Truncated {
                    hdr: HdrKind::Ether,
                    ..
                }))
            ));
        }

        let mut pkt = udp_frame(TOKEN, true);
        pkt.truncate(33);
        assert!(matches!(
            run(&mut pkt),
            Err(ProcessError::Parse(ParseError::Truncated {
                hdr: HdrKind::Ipv4,
                ..
            }))
        ));

        let mut pkt = udp_frame(TOKEN, true);
        pkt.truncate(41);
        assert!(matches!(
            run(&mut pkt),
            Err(ProcessError::Parse(ParseError::Truncated {
                hdr: HdrKind::Udp,
                ..
            }))
        ));
    }

    #[test]
    fn rewrite_overrun_is_checked_first() {
        let mut pkt = [0u8; 40];
        let dest = DestInfo::new(Ipv4Addr::from(NEW_DST), 1);
        assert_eq!(
            rewrite(&mut pkt, &dest),
            Err(ProcessError::RewriteOverrun { hdr: HdrKind::Udp, offset: 34 })
        );
        // The IPv4 header fit, but was left alone.
        assert_eq!(pkt, [0u8; 40]);

        let mut pkt = [0u8; 20];
        assert_eq!(
            rewrite(&mut pkt, &dest),
            Err(ProcessError::RewriteOverrun { hdr: HdrKind::Ipv4, offset: 14 })
        );
    }

    #[test]
    fn forwarder_counts() {
        let (macs, toks) = tables();
        let mut fwd =
            Forwarder::new("rxq0", FwdCfg::default(), macs, toks).unwrap();
        assert_eq!(fwd.name(), "rxq0");

        let mut hit = udp_frame(TOKEN, true);
        let mut miss = udp_frame([0; 8], true);
        let mut short = [0u8; 10];

        assert_eq!(
            fwd.process(&mut hit),
            Disposition::Redirect { egress: EGRESS_IDX }
        );
        assert_eq!(fwd.process(&mut miss), Disposition::Drop);
        assert_eq!(fwd.process(&mut short), Disposition::Aborted);
        assert!(fwd.try_process(&mut [0u8; 3]).is_err());

        let snap = fwd.stats();
        assert_eq!(snap.redirect_pkts, 1);
        assert_eq!(snap.redirect_bytes, hit.len() as u64);
        assert_eq!(snap.drop_pkts, 1);
        assert_eq!(snap.aborted_pkts, 2);
        assert_eq!(snap.aborted_bytes, 13);
        assert_eq!(snap.aborted_truncated, 2);
        assert_eq!(snap.pass_pkts, 0);
    }

    #[test]
    fn custom_cfg() {
        let (macs, toks) = tables();
        let cfg = FwdCfg {
            gateway_mac: MacAddr::from([0x02, 0, 0, 0, 0, 0x0A]),
            egress_idx: 5,
        };
        let mut pkt = udp_frame(TOKEN, true);
        assert_eq!(
            classify(&cfg, &macs, &toks, &mut pkt),
            Ok(Disposition::Redirect { egress: 5 })
        );
        assert_eq!(&pkt[6..12], &[0x02, 0, 0, 0, 0, 0x0A]);
    }

    #[test]
    fn bad_stats_name() {
        let (macs, toks) = tables();
        assert!(
            Forwarder::new("bad\0name", FwdCfg::default(), macs, toks).is_err()
        );
    }
}
