// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use slog::Drain;
use slog::Logger;
use slog::info;
use slog::o;

use tokfwd::engine::Forwarder;
use tokfwd::print::print_egress_table;
use tokfwd::print::print_mac_table;
use tokfwd::print::print_stats;
use tokfwd::print::print_token_table;
use tokfwdadm::API_VERSION;
use tokfwdadm::MAJOR_VERSION;
use tokfwdadm::config::Config;
use tokfwdadm::config::Tables;
use tokfwdadm::config::load_rules;
use tokfwdadm::config::rules_to_entries;
use tokfwdadm::pcap::Capture;
use tokfwdadm::pcap::PcapWriter;
use tokfwdadm::replay::replay;

/// Administer the token forwarder.
///
/// Log verbosity is controlled with `RUST_LOG`.
#[derive(Debug, Parser)]
#[command(version=tokfwd_pkg_version())]
enum Command {
    /// Load a configuration and print the tables it produces.
    DumpTables {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate a JSON rule file and print its entries.
    CheckRules { file: PathBuf },

    /// Run a packet capture through the forwarder.
    Replay {
        #[arg(short, long)]
        config: PathBuf,

        /// Capture to read frames from.
        #[arg(short, long)]
        input: PathBuf,

        /// Capture to write passed and redirected frames to.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn tokfwd_pkg_version() -> String {
    format!("{MAJOR_VERSION}.{API_VERSION}")
}

fn build_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("component" => "tokfwdadm"))
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = build_logger();

    match cmd {
        Command::DumpTables { config } => {
            let cfg = Config::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            info!(log, "config loaded"; "path" => %config.display());
            let tables = Tables::populate(&log, &cfg)?;

            print_mac_table(&tables.macs.dump())?;
            println!();
            print_token_table(&tables.tokens.dump())?;
            println!();
            print_egress_table(&tables.egress.dump())?;
        }

        Command::CheckRules { file } => {
            let rules = load_rules(&file)?;
            let entries = rules_to_entries(&rules)?;
            info!(log, "rules valid";
                "path" => %file.display(),
                "count" => entries.len(),
            );
            print_token_table(&entries)?;
        }

        Command::Replay { config, input, output } => {
            let cfg = Config::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            info!(log, "config loaded"; "path" => %config.display());
            let tables = Tables::populate(&log, &cfg)?;

            let cap = Capture::read(&input)?;
            info!(log, "capture loaded";
                "path" => %input.display(),
                "frames" => cap.frames.len(),
            );

            let mut fwd = Forwarder::new(
                "replay",
                cfg.fwd,
                tables.macs.clone(),
                tables.tokens.clone(),
            )
            .map_err(tokfwdadm::Error::from)?;

            let mut writer = match &output {
                Some(path) => {
                    let f = File::create(path).with_context(|| {
                        format!("creating {}", path.display())
                    })?;
                    Some(PcapWriter::new(
                        BufWriter::new(f),
                        cap.nanos,
                        cap.snaplen,
                    )?)
                }

                None => None,
            };

            let summary = replay(
                &log,
                &mut fwd,
                &*tables.egress,
                cap.frames,
                writer.as_mut(),
            )?;

            if let Some(w) = writer {
                w.finish()?;
            }

            println!(
                "frames: {}, written: {}",
                summary.frames, summary.written
            );
            print_stats(fwd.name(), &summary.stats)?;
        }
    }

    Ok(())
}
