// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Per-disposition counters.

use super::fwd::ProcessError;
use crate::api::Disposition;
use crate::ddi::kstat::KStatProvider;
use crate::ddi::kstat::KStatU64;
use kstat_macro::KStatProvider;

/// Packet and byte counts for each disposition handed back to the
/// host, plus the reason behind each abort.
///
/// One set is owned by each engine instance; snapshots of several
/// instances add up with `+=`.
#[derive(KStatProvider)]
pub struct DispositionStats {
    pub pass_pkts: KStatU64,
    pub pass_bytes: KStatU64,
    pub drop_pkts: KStatU64,
    pub drop_bytes: KStatU64,
    pub aborted_pkts: KStatU64,
    pub aborted_bytes: KStatU64,
    pub redirect_pkts: KStatU64,
    pub redirect_bytes: KStatU64,
    pub aborted_truncated: KStatU64,
    pub aborted_rewrite: KStatU64,
}

impl DispositionStats {
    /// Count a frame of `len` bytes against `disp`, and hand the
    /// disposition back unchanged.
    #[inline]
    pub fn record(&mut self, disp: Disposition, len: usize) -> Disposition {
        let len = len as u64;

        match disp {
            Disposition::Pass => {
                self.pass_pkts += 1;
                self.pass_bytes += len;
            }

            Disposition::Drop => {
                self.drop_pkts += 1;
                self.drop_bytes += len;
            }

            Disposition::Aborted => {
                self.aborted_pkts += 1;
                self.aborted_bytes += len;
            }

            Disposition::Redirect { .. } => {
                self.redirect_pkts += 1;
                self.redirect_bytes += len;
            }
        }

        disp
    }

    /// Note why a frame was aborted. The abort itself is counted by
    /// [`Self::record()`].
    #[inline]
    pub fn record_abort(&mut self, err: &ProcessError) {
        match err {
            ProcessError::Parse(_) => self.aborted_truncated += 1,
            ProcessError::RewriteOverrun { .. } => self.aborted_rewrite += 1,
        }
    }
}

impl Default for DispositionStats {
    fn default() -> Self {
        <Self as KStatProvider>::new()
    }
}
