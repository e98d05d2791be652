// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Forwarding configuration and rule files.
//!
//! The configuration is TOML:
//!
//! ```toml
//! gateway_mac = "42:01:C0:A8:01:04"
//! egress_idx = 0
//! egress = ["ens5"]
//! rules = "rules.json"
//!
//! [[redirect]]
//! src_mac = "A8:40:25:F7:00:01"
//! dst_mac = "A8:40:25:F7:00:63"
//!
//! [[forward]]
//! token = "deadbeef00000001"
//! gsaddress = "10.0.0.2"
//! gsport = "7777"
//! ```
//!
//! Rule files are the JSON arrays of [`BackendServer`] records the
//! control plane submits. A relative `rules` path is taken relative to
//! the directory holding the configuration file.

use crate::Error;
use serde::Deserialize;
use slog::Logger;
use slog::info;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokfwd::api::BackendServer;
use tokfwd::api::DestInfo;
use tokfwd::api::MacAddr;
use tokfwd::api::RedirectParams;
use tokfwd::api::Token;
use tokfwd::engine::fwd::EGRESS_IDX;
use tokfwd::engine::fwd::FwdCfg;
use tokfwd::engine::fwd::GATEWAY_MAC;
use tokfwd::engine::table::EGRESS_TABLE_CAP;
use tokfwd::engine::table::EgressTable;
use tokfwd::engine::table::MAC_TABLE_CAP;
use tokfwd::engine::table::MacTable;
use tokfwd::engine::table::TOKEN_TABLE_CAP;
use tokfwd::engine::table::TokenTable;

/// The table names stats and errors are reported under.
pub const MAC_TABLE_NAME: &str = "redirect_params";
pub const TOKEN_TABLE_NAME: &str = "forward_params";
pub const EGRESS_TABLE_NAME: &str = "tx_port";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    gateway_mac: Option<String>,
    egress_idx: Option<u32>,
    #[serde(default)]
    egress: Vec<String>,
    rules: Option<PathBuf>,
    #[serde(default)]
    redirect: Vec<RedirectEntry>,
    #[serde(default)]
    forward: Vec<BackendServer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RedirectEntry {
    src_mac: String,
    dst_mac: String,
}

/// A validated configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub fwd: FwdCfg,
    /// Egress interfaces, in index order.
    pub egress: Vec<String>,
    pub redirects: Vec<(MacAddr, RedirectParams)>,
    /// Forwarding entries, inline ones first, then those from the rule
    /// file.
    pub forwards: Vec<(Token, DestInfo)>,
}

impl Config {
    /// Load and validate the configuration at `path`, along with any
    /// rule file it names.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    /// Parse a configuration. A relative rule file path is resolved
    /// against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, Error> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;

        let gateway_mac = match &file.gateway_mac {
            Some(s) => parse_mac("gateway_mac", s)?,
            None => GATEWAY_MAC,
        };
        let egress_idx = file.egress_idx.unwrap_or(EGRESS_IDX);

        if file.egress.len() > EGRESS_TABLE_CAP.get() as usize {
            return Err(Error::Config(format!(
                "{} egress interfaces, at most {} allowed",
                file.egress.len(),
                EGRESS_TABLE_CAP,
            )));
        }

        let redirects = file
            .redirect
            .iter()
            .map(|r| {
                Ok((
                    parse_mac("src_mac", &r.src_mac)?,
                    RedirectParams::from(parse_mac("dst_mac", &r.dst_mac)?),
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut forwards = rules_to_entries(&file.forward)?;
        if let Some(rules) = &file.rules {
            forwards.extend(rules_to_entries(&load_rules(&base.join(rules))?)?);
        }

        Ok(Self {
            fwd: FwdCfg { gateway_mac, egress_idx },
            egress: file.egress,
            redirects,
            forwards,
        })
    }
}

fn parse_mac(field: &str, s: &str) -> Result<MacAddr, Error> {
    s.parse().map_err(|e| Error::Config(format!("{field}: {e}")))
}

/// Parse a JSON rule document: an array of [`BackendServer`] records.
pub fn parse_rules(json: &str) -> Result<Vec<BackendServer>, Error> {
    serde_json::from_str(json).map_err(|e| Error::Rules(e.to_string()))
}

pub fn load_rules(path: &Path) -> Result<Vec<BackendServer>, Error> {
    let text = fs::read_to_string(path)?;
    parse_rules(&text)
        .map_err(|e| Error::Rules(format!("{}: {e}", path.display())))
}

/// Validate every rule, naming the first bad one by position.
pub fn rules_to_entries(
    rules: &[BackendServer],
) -> Result<Vec<(Token, DestInfo)>, Error> {
    rules
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.to_entry().map_err(|e| Error::Rules(format!("rule {i}: {e}")))
        })
        .collect()
}

/// The tables a set of engine instances run against.
pub struct Tables {
    pub macs: Arc<MacTable>,
    pub tokens: Arc<TokenTable>,
    pub egress: Arc<EgressTable>,
}

impl Tables {
    pub fn new() -> Self {
        Self {
            macs: Arc::new(MacTable::new(MAC_TABLE_NAME, MAC_TABLE_CAP)),
            tokens: Arc::new(TokenTable::new(
                TOKEN_TABLE_NAME,
                TOKEN_TABLE_CAP,
            )),
            egress: Arc::new(EgressTable::new(
                EGRESS_TABLE_NAME,
                EGRESS_TABLE_CAP,
            )),
        }
    }

    /// Create tables holding every entry of `cfg`.
    ///
    /// A later forwarding entry for a token replaces an earlier one.
    pub fn populate(log: &Logger, cfg: &Config) -> Result<Self, Error> {
        let tables = Self::new();

        for (idx, ifname) in cfg.egress.iter().enumerate() {
            tables.egress.set(idx as u32, ifname.clone())?;
        }

        for (src, params) in &cfg.redirects {
            tables.macs.set(*src, *params)?;
        }

        for (token, dest) in &cfg.forwards {
            if let Some(old) = tables.tokens.set(*token, *dest)? {
                info!(log, "token entry replaced";
                    "token" => %token,
                    "old" => %old,
                    "new" => %dest,
                );
            }
        }

        info!(log, "tables populated";
            "redirect" => tables.macs.len(),
            "forward" => tables.tokens.len(),
            "egress" => tables.egress.len(),
        );

        Ok(tables)
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}
