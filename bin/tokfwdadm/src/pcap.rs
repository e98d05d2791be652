// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Classic libpcap capture files with an Ethernet link type.

use crate::Error;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC_USEC: u32 = 0xa1b2c3d4;
const MAGIC_NSEC: u32 = 0xa1b23c4d;
const DEFAULT_SNAPLEN: u32 = 65535;

/// One captured frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub ts_sec: u32,
    /// Microseconds, or nanoseconds for a nanosecond capture.
    pub ts_frac: u32,
    /// The wire length, which exceeds `data.len()` when the capture
    /// truncated the frame.
    pub orig_len: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { ts_sec: 0, ts_frac: 0, orig_len: data.len() as u32, data }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Capture {
    pub nanos: bool,
    pub snaplen: u32,
    pub frames: Vec<Frame>,
}

impl Default for Capture {
    fn default() -> Self {
        Self { nanos: false, snaplen: DEFAULT_SNAPLEN, frames: vec![] }
    }
}

impl Capture {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
            .map_err(|e| Error::Pcap(format!("{}: {e}", path.display())))
    }

    /// Parse an in-memory capture of either byte order.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let (mut rest, hdr) = pcap::parse_pcap_header(bytes)
            .map_err(|e| Error::Pcap(format!("bad header: {e:?}")))?;

        if hdr.network != Linktype::ETHERNET {
            return Err(Error::Pcap(format!(
                "unsupported link type {:?}",
                hdr.network
            )));
        }

        let be = hdr.is_bigendian();
        let mut frames = vec![];
        while !rest.is_empty() {
            let res = if be {
                pcap::parse_pcap_frame_be(rest)
            } else {
                pcap::parse_pcap_frame(rest)
            };

            let (new_rest, block) = res.map_err(|e| {
                Error::Pcap(format!("bad frame {}: {e:?}", frames.len()))
            })?;

            frames.push(Frame {
                ts_sec: block.ts_sec,
                ts_frac: block.ts_usec,
                orig_len: block.origlen,
                data: block.data.to_vec(),
            });
            rest = new_rest;
        }

        Ok(Self {
            nanos: hdr.is_nanosecond_precision(),
            snaplen: hdr.snaplen,
            frames,
        })
    }

    pub fn write_to<W: Write>(&self, out: W) -> Result<W, Error> {
        let mut w = PcapWriter::new(out, self.nanos, self.snaplen)?;
        for f in &self.frames {
            w.add_frame(f)?;
        }
        w.finish()
    }
}

/// Streams frames to a little-endian capture.
pub struct PcapWriter<W: Write> {
    out: W,
    count: usize,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut out: W, nanos: bool, snaplen: u32) -> Result<Self, Error> {
        let mut hdr = PcapHeader {
            magic_number: if nanos { MAGIC_NSEC } else { MAGIC_USEC },
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen,
            network: Linktype::ETHERNET,
        };

        let bytes = hdr
            .to_vec()
            .map_err(|e| Error::Pcap(format!("header: {e:?}")))?;
        out.write_all(&bytes)?;

        Ok(Self { out, count: 0 })
    }

    pub fn add_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        let mut block = LegacyPcapBlock {
            ts_sec: frame.ts_sec,
            ts_usec: frame.ts_frac,
            caplen: frame.data.len() as u32,
            origlen: frame.orig_len.max(frame.data.len() as u32),
            data: &frame.data,
        };

        let bytes = block
            .to_vec()
            .map_err(|e| Error::Pcap(format!("frame {}: {e:?}", self.count)))?;
        self.out.write_all(&bytes)?;
        self.count += 1;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(mut self) -> Result<W, Error> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(ts_sec: u32, data: &[u8]) -> Frame {
        Frame {
            ts_sec,
            ts_frac: 250,
            orig_len: data.len() as u32,
            data: data.to_vec(),
        }
    }

    #[test]
    fn keeps_timestamps() {
        let cap = Capture {
            nanos: true,
            snaplen: 1500,
            frames: vec![frame(1, &[0xAA; 60]), frame(2, &[0xBB; 61])],
        };
        let bytes = cap.write_to(Vec::new()).unwrap();
        assert_eq!(&bytes[..4], &MAGIC_NSEC.to_le_bytes());
        assert_eq!(Capture::parse(&bytes).unwrap(), cap);
    }

    #[test]
    fn big_endian() {
        // Hand-built big-endian capture holding one 4-byte frame.
        let mut bytes = vec![];
        bytes.extend_from_slice(&MAGIC_USEC.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1500u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&9u32.to_be_bytes());
        bytes.extend_from_slice(&10u32.to_be_bytes());
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let cap = Capture::parse(&bytes).unwrap();
        assert!(!cap.nanos);
        assert_eq!(cap.snaplen, 1500);
        assert_eq!(
            cap.frames,
            vec![Frame {
                ts_sec: 9,
                ts_frac: 10,
                orig_len: 4,
                data: vec![1, 2, 3, 4]
            }]
        );
    }

    #[test]
    fn rejects() {
        assert!(matches!(Capture::parse(&[]), Err(Error::Pcap(_))));

        let mut bytes = Capture::default().write_to(Vec::new()).unwrap();
        // Link type 0 is BSD loopback.
        bytes[20..24].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(Capture::parse(&bytes), Err(Error::Pcap(_))));

        let cap = Capture {
            frames: vec![frame(1, &[0xAA; 60])],
            ..Default::default()
        };
        let bytes = cap.write_to(Vec::new()).unwrap();
        assert!(matches!(
            Capture::parse(&bytes[..bytes.len() - 1]),
            Err(Error::Pcap(_))
        ));
    }
}
