// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print tables and stats in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both tokfwdadm and integration tests.

use crate::api::DestInfo;
use crate::api::MacAddr;
use crate::api::RedirectParams;
use crate::api::Token;
use crate::engine::stat::DispositionStatsSnap;
use std::io::Write;
use std::string::String;
use tabwriter::TabWriter;

/// Print the redirect table.
pub fn print_mac_table(
    entries: &[(MacAddr, RedirectParams)],
) -> std::io::Result<()> {
    print_mac_table_into(&mut std::io::stdout(), entries)
}

/// Print the redirect table.
pub fn print_mac_table_into(
    writer: &mut impl Write,
    entries: &[(MacAddr, RedirectParams)],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Redirect Table")?;
    write_hr(&mut t)?;
    writeln!(t, "SRC MAC\tDST MAC")?;
    for (src, params) in entries {
        writeln!(t, "{src}\t{}", params.dst_mac)?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print the token table.
pub fn print_token_table(
    entries: &[(Token, DestInfo)],
) -> std::io::Result<()> {
    print_token_table_into(&mut std::io::stdout(), entries)
}

/// Print the token table.
pub fn print_token_table_into(
    writer: &mut impl Write,
    entries: &[(Token, DestInfo)],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Token Table")?;
    write_hr(&mut t)?;
    writeln!(t, "TOKEN\tADDR\tPORT")?;
    for (token, dest) in entries {
        writeln!(t, "{token}\t{}\t{}", dest.daddr, dest.dport)?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print the egress table.
pub fn print_egress_table(entries: &[(u32, String)]) -> std::io::Result<()> {
    print_egress_table_into(&mut std::io::stdout(), entries)
}

/// Print the egress table.
pub fn print_egress_table_into(
    writer: &mut impl Write,
    entries: &[(u32, String)],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Egress Table")?;
    write_hr(&mut t)?;
    writeln!(t, "INDEX\tINTERFACE")?;
    for (idx, ifname) in entries {
        writeln!(t, "{idx}\t{ifname}")?;
    }
    writeln!(t)?;
    t.flush()
}

/// Print a snapshot of an engine's disposition stats.
pub fn print_stats(
    name: &str,
    snap: &DispositionStatsSnap,
) -> std::io::Result<()> {
    print_stats_into(&mut std::io::stdout(), name, snap)
}

/// Print a snapshot of an engine's disposition stats.
pub fn print_stats_into(
    writer: &mut impl Write,
    name: &str,
    snap: &DispositionStatsSnap,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Stats {name}")?;
    write_hrb(&mut t)?;
    writeln!(t, "DISPOSITION\tPKTS\tBYTES")?;
    writeln!(t, "PASS\t{}\t{}", snap.pass_pkts, snap.pass_bytes)?;
    writeln!(t, "DROP\t{}\t{}", snap.drop_pkts, snap.drop_bytes)?;
    writeln!(t, "REDIRECT\t{}\t{}", snap.redirect_pkts, snap.redirect_bytes)?;
    writeln!(t, "ABORTED\t{}\t{}", snap.aborted_pkts, snap.aborted_bytes)?;
    t.flush()?;

    writeln!(t, "\nAbort Reasons")?;
    write_hr(&mut t)?;
    writeln!(t, "truncated\t{}", snap.aborted_truncated)?;
    writeln!(t, "rewrite overrun\t{}", snap.aborted_rewrite)?;
    writeln!(t)?;
    t.flush()
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
