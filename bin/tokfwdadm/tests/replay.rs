// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Replay captures through the admin tool, both as a library and as
//! the installed binary.

use slog::Discard;
use slog::Logger;
use slog::o;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use tokfwd_test_utils::*;
use tokfwdadm::config::Config;
use tokfwdadm::config::Tables;
use tokfwdadm::pcap::Capture;
use tokfwdadm::pcap::PcapWriter;
use tokfwdadm::replay::replay;

fn config_text() -> String {
    format!(
        r#"
egress = ["ens5"]

[[redirect]]
src_mac = "{CLIENT_MAC}"
dst_mac = "{NEXT_HOP_MAC}"

[[forward]]
token = "{KNOWN_TOKEN}"
gsaddress = "{BACKEND_IP}"
gsport = "{BACKEND_PORT}"
"#
    )
}

/// A scratch directory unique to one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("tokfwdadm-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// In order: redirected, dropped (token miss), passed (TCP), passed
/// (ARP), aborted (runt).
fn input_frames() -> Vec<Vec<u8>> {
    vec![
        FrameBuilder::udp(KNOWN_TOKEN).build(),
        FrameBuilder::udp(UNKNOWN_TOKEN).build(),
        FrameBuilder::tcp().build(),
        FrameBuilder::arp().build(),
        vec![0xAA; 10],
    ]
}

#[test]
fn replay_writes_delivered_frames() {
    let log = Logger::root(Discard, o!());
    let cfg = Config::parse(&config_text(), Path::new(".")).unwrap();
    let tables = Tables::populate(&log, &cfg).unwrap();
    let mut fwd = Forwarder::new(
        "replay-lib",
        cfg.fwd,
        tables.macs.clone(),
        tables.tokens.clone(),
    )
    .unwrap();

    let input = input_frames();
    let cap = Capture::parse(&pcap::capture(&input)).unwrap();
    assert_eq!(cap.frames.len(), input.len());

    let mut w = PcapWriter::new(Vec::new(), cap.nanos, cap.snaplen).unwrap();
    let sum =
        replay(&log, &mut fwd, &*tables.egress, cap.frames, Some(&mut w))
            .unwrap();

    assert_eq!(sum.frames, 5);
    assert_eq!(sum.written, 3);
    assert_eq!(sum.stats.redirect_pkts, 1);
    assert_eq!(sum.stats.drop_pkts, 1);
    assert_eq!(sum.stats.pass_pkts, 2);
    assert_eq!(sum.stats.aborted_pkts, 1);

    let out = pcap::read_frames(&w.finish().unwrap());
    assert_eq!(out.len(), 3);

    // The same frame through an engine built from the fixture tables
    // comes out identical.
    let mut expected = input[0].clone();
    let disp = forwarder("replay-expected").process(&mut expected);
    assert_eq!(disp, Disposition::Redirect { egress: EGRESS_IDX });
    assert_eq!(out[0], expected);
    assert_eq!(ipv4_dst(&out[0]), BACKEND_IP);
    assert!(ipv4_csum_ok(&out[0]));
    assert_eq!(udp_csum(&out[0]), recompute_udp_csum(&out[0]));

    assert_eq!(out[1], input[2]);
    assert_eq!(out[2], input[3]);
}

#[test]
fn cli_replay() {
    let dir = scratch("cli-replay");
    let cfg = dir.join("tokfwd.toml");
    let input = dir.join("in.pcap");
    let output = dir.join("out.pcap");
    fs::write(&cfg, config_text()).unwrap();
    fs::write(&input, pcap::capture(&input_frames())).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_tokfwdadm"))
        .arg("replay")
        .arg("--config")
        .arg(&cfg)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let out = pcap::read_frames(&fs::read(&output).unwrap());
    assert_eq!(out.len(), 3);
    assert_eq!(ipv4_dst(&out[0]), BACKEND_IP);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn cli_check_rules() {
    let dir = scratch("cli-rules");
    let good = dir.join("good.json");
    let bad = dir.join("bad.json");
    fs::write(
        &good,
        format!(
            r#"[{{"token": "{KNOWN_TOKEN}", "gsaddress": "{BACKEND_IP}", "gsport": "{BACKEND_PORT}"}}]"#
        ),
    )
    .unwrap();
    fs::write(
        &bad,
        r#"[{"token": "00112233", "gsaddress": "10.0.0.2", "gsport": "1"}]"#,
    )
    .unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_tokfwdadm"))
        .arg("check-rules")
        .arg(&good)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains(&BACKEND_IP.to_string()));

    let status = Command::new(env!("CARGO_BIN_EXE_tokfwdadm"))
        .arg("check-rules")
        .arg(&bad)
        .status()
        .unwrap();
    assert!(!status.success());

    fs::remove_dir_all(&dir).unwrap();
}
