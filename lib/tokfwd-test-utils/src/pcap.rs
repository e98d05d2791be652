// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routines for building and reading packet capture files.

use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn get_header(offset: &[u8]) -> (&[u8], PcapHeader) {
    match pcap::parse_pcap_header(offset) {
        Ok((new_offset, header)) => (new_offset, header),
        Err(e) => panic!("failed to get header: {e:?}"),
    }
}

fn next_block(offset: &[u8]) -> (&[u8], LegacyPcapBlock<'_>) {
    match pcap::parse_pcap_frame(offset) {
        Ok((new_offset, block)) => {
            // We always want access to the entire packet.
            assert_eq!(block.origlen, block.caplen);
            (new_offset, block)
        }

        Err(e) => panic!("failed to get next block: {e:?}"),
    }
}

/// Read every frame out of an in-memory capture.
pub fn read_frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let (mut rest, hdr) = get_header(bytes);
    assert_eq!(hdr.network, Linktype::ETHERNET);

    let mut frames = vec![];
    while !rest.is_empty() {
        let (new_rest, block) = next_block(rest);
        frames.push(block.data.to_vec());
        rest = new_rest;
    }

    frames
}

/// Build a packet capture from a series of packets.
pub struct PcapBuilder<W: Write> {
    out: W,
}

impl PcapBuilder<File> {
    /// Create a new pcap builder, writing all captures to `path`.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self::new(File::create(path).unwrap())
    }
}

impl<W: Write> PcapBuilder<W> {
    pub fn new(mut out: W) -> Self {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 1500,
            network: Linktype::ETHERNET,
        };

        out.write_all(&hdr.to_vec().unwrap()).unwrap();

        Self { out }
    }

    /// Add a packet to the capture.
    pub fn add_pkt(&mut self, pkt: &[u8]) {
        let mut block = LegacyPcapBlock {
            ts_sec: 7777,
            ts_usec: 7777,
            caplen: pkt.len() as u32,
            origlen: pkt.len() as u32,
            data: pkt,
        };

        self.out.write_all(&block.to_vec().unwrap()).unwrap();
    }

    pub fn finish(self) -> W {
        self.out
    }
}

/// An in-memory capture of `frames`.
pub fn capture(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut pcap = PcapBuilder::new(Vec::new());
    for f in frames {
        pcap.add_pkt(f);
    }
    pcap.finish()
}
