// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! tokfwd administration library
//!
//! Loads forwarding configuration and rule files, populates the
//! forwarding tables, and replays packet captures through the engine.

pub mod config;
pub mod pcap;
pub mod replay;

use std::io;
use thiserror::Error;
use tokfwd::ddi::kstat;
use tokfwd::engine::table::TableError;

pub use tokfwd_api::API_VERSION;
pub use tokfwd_api::MAJOR_VERSION;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid rules: {0}")]
    Rules(String),

    #[error("pcap error: {0}")]
    Pcap(String),

    #[error("table error: {0}")]
    Table(TableError),

    #[error("stats error: {0}")]
    Stats(kstat::Error),
}

impl From<TableError> for Error {
    fn from(e: TableError) -> Self {
        Self::Table(e)
    }
}

impl From<kstat::Error> for Error {
    fn from(e: kstat::Error) -> Self {
        Self::Stats(e)
    }
}
