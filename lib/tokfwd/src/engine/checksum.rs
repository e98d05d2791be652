// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types and routines for calculating the internet checksum.
//!
//! This module contains two families of tools.
//!
//! The [`Checksum`] type provides a rolling one's complement checksum
//! over arbitrary bytes, which is finalized into a [`HeaderChecksum`]
//! -- the value stored in the actual header bytes. It is used when a
//! header is built from scratch, and as the reference any incremental
//! update must agree with.
//!
//! The free functions implement incremental updates (RFC 1624), where
//! the new checksum is derived from the old one and the delta of the
//! field that changed, without rescanning the header:
//!
//! * [`csum_diff()`] + [`csum_fold()`]: the difference of two full
//!   header images, in 32-bit words.
//!
//! * [`update_csum64()`]: the difference of a single 32-bit field,
//!   accumulated in 64 bits and folded in a fixed number of rounds.
//!
//! * [`csum16_add()`]: one 16-bit addend with end-around carry.
//!
//! All of them compute `HC' = ~(~HC + ~m + m')`.
//!
//! # Checksums and Endianness
//!
//! You never perform byte-order conversion on a checksum field, nor on
//! the words being summed. Each pair of bytes is treated as a native
//! 16-bit integer (`{to,from}_ne_bytes()`), and each group of four as
//! a native 32-bit integer. On a little-endian machine this logically
//! swaps the bytes of every word, but since the bytes being summed are
//! all in network order, storing the sum back to memory the same way
//! leaves it in network order too. See RFC 1071 §1.B.
//!
//! # Relevant RFCs
//!
//! * 768 User Datagram Protocol
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 1624 Computation of the Internet Checksum via Incremental Update

use core::fmt;
use core::fmt::Display;

/// The number of rounds [`fold64()`] performs.
///
/// The widest value [`update_csum64()`] produces is `0xFFFF + 2 *
/// 0xFFFF_FFFF`, which needs two rounds to come under 17 bits and a
/// third to absorb the last carry. The fourth round is always a no-op
/// for that domain.
pub const FOLD64_ROUNDS: usize = 4;

/// The checksum values, as it is contained in a network header.
///
/// This is meant to hold the bytes as they are stored in the header
/// itself. Notably, it contains the bytes with one's complement
/// applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Wrap the checksum bytes in a header.
    ///
    /// The "wrap" verbiage is meant to make it clear that we are
    /// wrapping a pair of bytes which represent a header checksum --
    /// i.e., the one's complement of a one's complement sum.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// As opposed to constantly taking the one's complement, updating the
/// sum, and re-applying one's complement, this delays summing the
/// carries until the finalized sum is needed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self::from(0)
    }

    /// Update the sum by adding the contents of `bytes`.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Update the sum by subtracting the contents of `bytes`.
    pub fn sub_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_sub(self.inner, bytes);
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }
}

impl From<HeaderChecksum> for Checksum {
    // Convert a header's checksum bytes into a rolling checksum.
    fn from(hc: HeaderChecksum) -> Self {
        Self { inner: (!u16::from_ne_bytes(hc.bytes())) as u32 }
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self { inner: self.inner + other.inner }
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, other: Self) {
        self.inner += other.inner
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut chunks = bytes.chunks_exact(2);

    for pair in &mut chunks {
        csum += u16::from_ne_bytes([pair[0], pair[1]]) as u32;
    }

    // An odd trailing byte is padded with zero on the right, in
    // network order.
    if let [last] = chunks.remainder() {
        csum += u16::from_ne_bytes([*last, 0]) as u32;
    }

    csum
}

fn csum_sub(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut chunks = bytes.chunks_exact(2);

    for pair in &mut chunks {
        csum += (!u16::from_ne_bytes([pair[0], pair[1]])) as u32;
    }

    if let [last] = chunks.remainder() {
        csum += (!u16::from_ne_bytes([*last, 0])) as u32;
    }

    csum
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChecksumError {
    /// The old and new images differ in length.
    LengthMismatch { old: usize, new: usize },
    /// The images are not a whole number of 32-bit words.
    NotWordAligned { len: usize },
}

impl Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LengthMismatch { old, new } => {
                write!(f, "image length mismatch: old {old}, new {new}")
            }

            Self::NotWordAligned { len } => {
                write!(f, "image length {len} is not a multiple of 4")
            }
        }
    }
}

/// Compute the one's complement difference between two images of the
/// same header, seeded with an existing partial sum.
///
/// The result is the 32-bit sum of `seed`, the complement of every
/// 32-bit word of `old`, and every 32-bit word of `new`, with carries
/// wrapped back around. Pass it to [`csum_fold()`] to produce a header
/// checksum. When `seed` is the complement of the checksum stored in
/// `old`, the folded result is the checksum for `new`.
pub fn csum_diff(old: &[u8], new: &[u8], seed: u32) -> Result<u32, ChecksumError> {
    if old.len() != new.len() {
        return Err(ChecksumError::LengthMismatch {
            old: old.len(),
            new: new.len(),
        });
    }

    if old.len() % 4 != 0 {
        return Err(ChecksumError::NotWordAligned { len: old.len() });
    }

    let mut sum = u64::from(seed);

    for w in old.chunks_exact(4) {
        sum += u64::from(!u32::from_ne_bytes([w[0], w[1], w[2], w[3]]));
    }

    for w in new.chunks_exact(4) {
        sum += u64::from(u32::from_ne_bytes([w[0], w[1], w[2], w[3]]));
    }

    // Two end-around carries bring any sum of at most 2^32 words back
    // into 32 bits.
    sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
    sum = (sum & 0xFFFF_FFFF) + (sum >> 32);

    Ok(sum as u32)
}

/// Fold a 32-bit partial sum into a 16-bit header checksum: add the
/// high and low halves, add the carry once more, and complement.
#[inline]
pub fn csum_fold(csum: u32) -> u16 {
    let mut sum = (csum >> 16) + (csum & 0xFFFF);
    sum += sum >> 16;
    !(sum as u16)
}

/// Add a 16-bit addend to a 16-bit one's complement sum, wrapping the
/// carry back into the low bit.
#[inline]
pub fn csum16_add(csum: u16, addend: u16) -> u16 {
    let sum = csum.wrapping_add(addend);
    sum.wrapping_add(u16::from(sum < addend))
}

/// Fold a 64-bit accumulator into a 16-bit header checksum.
///
/// Exactly [`FOLD64_ROUNDS`] rounds are performed, each adding the
/// bits above 16 into the low 16 when there are any. The result is
/// complemented.
#[inline]
pub fn fold64(mut csum: u64) -> u16 {
    for _ in 0..FOLD64_ROUNDS {
        if csum >> 16 != 0 {
            csum = (csum & 0xFFFF) + (csum >> 16);
        }
    }

    !(csum as u16)
}

/// Update a header checksum for the replacement of one 32-bit field.
///
/// On entry `csum` holds the checksum as stored in the header, read as
/// a native `u16`; `old` and `new` are the field's values read as
/// native `u32`s. On return `csum` holds the new header checksum.
#[inline]
pub fn update_csum64(csum: &mut u64, old: u32, new: u32) {
    // ~HC
    *csum = !*csum & 0xFFFF;
    // + ~m
    *csum += u64::from(!old);
    // + m'
    *csum += u64::from(new);
    *csum = u64::from(fold64(*csum));
}

#[cfg(test)]
mod test {
    use super::*;

    // 10.0.0.1 -> 10.0.0.2, UDP, TTL 64, checksum field zeroed.
    const IP4_HDR: [u8; 20] = [
        0x45, 0x00, 0x00, 0x30, 0x12, 0x34, 0x40, 0x00, 0x40, 0x11, 0x00,
        0x00, 0x0A, 0x00, 0x00, 0x01, 0x0A, 0x00, 0x00, 0x02,
    ];

    fn full(hdr: &[u8]) -> u16 {
        let mut c = Checksum::compute(hdr);
        !c.finalize()
    }

    fn with_csum(mut hdr: [u8; 20]) -> [u8; 20] {
        hdr[10..12].copy_from_slice(&[0, 0]);
        let c = full(&hdr);
        hdr[10..12].copy_from_slice(&c.to_ne_bytes());
        hdr
    }

    #[test]
    fn full_checksum_verifies() {
        let hdr = with_csum(IP4_HDR);
        // Summing a header with a correct checksum yields all ones.
        let mut c = Checksum::compute(&hdr);
        assert_eq!(c.finalize(), 0xFFFF);
    }

    #[test]
    fn header_checksum_conversions() {
        let hdr = with_csum(IP4_HDR);
        let hc = HeaderChecksum::wrap([hdr[10], hdr[11]]);
        let mut body = hdr;
        body[10..12].copy_from_slice(&[0, 0]);
        let csum = Checksum::compute(&body);
        assert_eq!(HeaderChecksum::from(csum), hc);
        let mut back = Checksum::from(hc);
        assert_eq!(back.finalize(), Checksum::compute(&body).finalize());
    }

    #[test]
    fn odd_length_pads_right() {
        let mut a = Checksum::compute(&[0xAB]);
        let mut b = Checksum::compute(&[0xAB, 0x00]);
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn sub_bytes_undoes_add_bytes() {
        let mut c = Checksum::compute(&IP4_HDR);
        c.add_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]);
        c.sub_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut base = Checksum::compute(&IP4_HDR);
        // One's complement: x + m - m == x, modulo the +0/-0 ambiguity
        // which cannot arise for a non-zero header.
        assert_eq!(c.finalize(), base.finalize());
    }

    #[test]
    fn csum16_add_carries() {
        assert_eq!(csum16_add(0x0001, 0x0002), 0x0003);
        assert_eq!(csum16_add(0xFFFF, 0x0001), 0x0001);
        assert_eq!(csum16_add(0xFFFE, 0x0001), 0xFFFF);
        assert_eq!(csum16_add(0x8000, 0x8000), 0x0001);
        assert_eq!(csum16_add(0, 0), 0);
    }

    #[test]
    fn fold64_rounds() {
        assert_eq!(fold64(0), 0xFFFF);
        assert_eq!(fold64(0x1234), !0x1234);
        assert_eq!(fold64(0x1_0000), !0x0001);
        // The widest value update_csum64() can produce.
        let widest = 0xFFFF + 2 * 0xFFFF_FFFFu64;
        let mut v = widest;
        while v >> 16 != 0 {
            v = (v & 0xFFFF) + (v >> 16);
        }
        assert_eq!(fold64(widest), !(v as u16));
    }

    #[test]
    fn fold64_needs_at_most_three_rounds() {
        let widest = 0xFFFF + 2 * 0xFFFF_FFFFu64;
        let mut v = widest;
        let mut rounds = 0;
        while v >> 16 != 0 {
            v = (v & 0xFFFF) + (v >> 16);
            rounds += 1;
        }
        assert!(rounds < FOLD64_ROUNDS);
    }

    #[test]
    fn update_csum64_matches_full() {
        let old_hdr = with_csum(IP4_HDR);
        let new_dsts: [[u8; 4]; 6] = [
            [192, 168, 1, 9],
            [0, 0, 0, 0],
            [255, 255, 255, 255],
            [10, 0, 0, 2],
            [0x80, 0x00, 0x00, 0x01],
            [1, 2, 3, 4],
        ];

        for dst in new_dsts {
            let mut expected = old_hdr;
            expected[16..20].copy_from_slice(&dst);
            let expected = with_csum(expected);

            let mut csum = u64::from(u16::from_ne_bytes([old_hdr[10], old_hdr[11]]));
            update_csum64(
                &mut csum,
                u32::from_ne_bytes([old_hdr[16], old_hdr[17], old_hdr[18], old_hdr[19]]),
                u32::from_ne_bytes(dst),
            );

            assert_eq!(
                (csum as u16).to_ne_bytes(),
                [expected[10], expected[11]],
                "dst {dst:?}"
            );
        }
    }

    #[test]
    fn csum_diff_matches_full() {
        let old_hdr = with_csum(IP4_HDR);
        let mut new_hdr = old_hdr;
        new_hdr[16..20].copy_from_slice(&[172, 16, 254, 3]);
        let expected = with_csum(new_hdr);

        let seed = u32::from(!u16::from_ne_bytes([old_hdr[10], old_hdr[11]]));
        let diff = csum_diff(&old_hdr, &new_hdr, seed).unwrap();
        assert_eq!(
            csum_fold(diff).to_ne_bytes(),
            [expected[10], expected[11]]
        );
    }

    #[test]
    fn csum_diff_and_update_csum64_agree() {
        let old_hdr = with_csum(IP4_HDR);
        let old_check = u16::from_ne_bytes([old_hdr[10], old_hdr[11]]);
        let old_dst = [old_hdr[16], old_hdr[17], old_hdr[18], old_hdr[19]];

        for dst in [[8, 8, 8, 8], [203, 0, 113, 77], [10, 0, 0, 1]] {
            let mut new_hdr = old_hdr;
            new_hdr[16..20].copy_from_slice(&dst);

            let seed = u32::from(!old_check);
            let by_diff = csum_fold(csum_diff(&old_hdr, &new_hdr, seed).unwrap());

            let mut by_64 = u64::from(old_check);
            update_csum64(
                &mut by_64,
                u32::from_ne_bytes(old_dst),
                u32::from_ne_bytes(dst),
            );

            assert_eq!(by_diff, by_64 as u16);
        }
    }

    #[test]
    fn csum_diff_rejects_bad_images() {
        assert_eq!(
            csum_diff(&[0; 8], &[0; 4], 0),
            Err(ChecksumError::LengthMismatch { old: 8, new: 4 })
        );
        assert_eq!(
            csum_diff(&[0; 6], &[0; 6], 0),
            Err(ChecksumError::NotWordAligned { len: 6 })
        );
    }
}
