// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Run a capture through one engine instance.

use crate::Error;
use crate::pcap::Frame;
use crate::pcap::PcapWriter;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::warn;
use std::io::Write;
use tokfwd::api::DestInfo;
use tokfwd::api::Disposition;
use tokfwd::api::MacAddr;
use tokfwd::api::RedirectParams;
use tokfwd::api::Token;
use tokfwd::engine::Forwarder;
use tokfwd::engine::stat::DispositionStatsSnap;
use tokfwd::engine::table::Lookup;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub frames: usize,
    pub written: usize,
    /// The instance's counters once the capture is done.
    pub stats: DispositionStatsSnap,
}

/// Feed every frame through `fwd`, in order.
///
/// Frames the engine hands on (Pass or Redirect) are written to `out`,
/// if given, as the engine left them. Dropped and aborted frames are
/// not. Redirect egress indices are resolved through `egress` for the
/// log only.
pub fn replay<M, T, E, W>(
    log: &Logger,
    fwd: &mut Forwarder<M, T>,
    egress: &E,
    frames: impl IntoIterator<Item = Frame>,
    mut out: Option<&mut PcapWriter<W>>,
) -> Result<Summary, Error>
where
    M: Lookup<MacAddr, RedirectParams>,
    T: Lookup<Token, DestInfo>,
    E: Lookup<u32, String>,
    W: Write,
{
    let mut summary = Summary::default();

    for (idx, mut frame) in frames.into_iter().enumerate() {
        summary.frames += 1;

        let disp = match fwd.try_process(&mut frame.data) {
            Ok(disp) => disp,

            Err(e) => {
                warn!(log, "frame aborted";
                    "frame" => idx,
                    "len" => frame.data.len(),
                    "error" => %e,
                );
                Disposition::Aborted
            }
        };

        match disp {
            Disposition::Redirect { egress: eidx } => {
                let ifname = egress
                    .lookup(&eidx)
                    .unwrap_or_else(|| String::from("<unknown>"));
                debug!(log, "frame processed";
                    "frame" => idx,
                    "disposition" => %disp,
                    "egress" => ifname,
                );
            }

            _ => {
                debug!(log, "frame processed";
                    "frame" => idx,
                    "disposition" => %disp,
                );
            }
        }

        if disp.is_delivered() {
            if let Some(w) = out.as_deref_mut() {
                w.add_frame(&frame)?;
                summary.written += 1;
            }
        }
    }

    summary.stats = fwd.stats();
    info!(log, "replay done";
        "instance" => fwd.name(),
        "frames" => summary.frames,
        "written" => summary.written,
        "pass" => summary.stats.pass_pkts,
        "redirect" => summary.stats.redirect_pkts,
        "drop" => summary.stats.drop_pkts,
        "aborted" => summary.stats.aborted_pkts,
    );

    Ok(summary)
}
