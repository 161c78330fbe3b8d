//! Node configuration: CLI flags (via `clap`) layered over an optional INI
//! file (via `rust-ini`), following the teacher's `Cli::parse()` +
//! `rust-ini` dependency pair.

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ChordError;
use crate::identifier::M;

#[derive(Parser, Debug)]
#[command(name = "ringkeeper", about = "A Chord-style distributed hash table node")]
pub struct Cli {
    /// Address this node listens on and advertises to peers.
    #[arg(long, default_value = "127.0.0.1")]
    pub address: String,

    /// Port this node listens on.
    #[arg(long, default_value_t = 50001)]
    pub port: u16,

    /// Address of an existing ring member to join through. Omit to start a
    /// new one-node ring.
    #[arg(long)]
    pub peer_address: Option<String>,

    #[arg(long, requires = "peer_address")]
    pub peer_port: Option<u16>,

    /// Maintenance tick period, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub interval_millis: u64,

    /// Per-RPC timeout, in milliseconds. Should stay below `interval / 2`.
    #[arg(long, default_value_t = 400)]
    pub rpc_timeout_millis: u64,

    /// Enable debug RPCs (get_all_data dumps, node summaries).
    #[arg(long)]
    pub dev_mode: bool,

    /// Optional INI config file overriding the defaults above (CLI flags
    /// that are explicitly passed still win).
    #[arg(long)]
    pub config_file: Option<String>,
}

/// Fully resolved configuration for a running node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub peer: Option<(String, u16)>,
    pub interval: Duration,
    pub rpc_timeout: Duration,
    pub dev_mode: bool,
    pub identifier_bits: u32,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Config, ChordError> {
        let mut config = Config {
            address: cli.address.clone(),
            port: cli.port,
            peer: cli
                .peer_address
                .clone()
                .map(|addr| (addr, cli.peer_port.unwrap_or(cli.port))),
            interval: Duration::from_millis(cli.interval_millis),
            rpc_timeout: Duration::from_millis(cli.rpc_timeout_millis),
            dev_mode: cli.dev_mode,
            identifier_bits: M,
        };

        if let Some(path) = &cli.config_file {
            config.apply_ini_overrides(path)?;
        }

        if config.rpc_timeout * 2 > config.interval {
            log::warn!(
                "rpc_timeout ({:?}) should be at most half of interval ({:?})",
                config.rpc_timeout,
                config.interval
            );
        }

        Ok(config)
    }

    fn apply_ini_overrides(&mut self, path: &str) -> Result<(), ChordError> {
        let ini = ini::Ini::load_from_file(path)
            .map_err(|e| ChordError::Configuration(format!("{path}: {e}")))?;
        let section = ini.section(Some("ringkeeper"));
        if let Some(section) = section {
            if let Some(v) = section.get("address") {
                self.address = v.to_string();
            }
            if let Some(v) = section.get("port") {
                self.port = v
                    .parse()
                    .map_err(|_| ChordError::Configuration(format!("invalid port: {v}")))?;
            }
            if let Some(v) = section.get("interval_millis") {
                let millis: u64 = v
                    .parse()
                    .map_err(|_| ChordError::Configuration(format!("invalid interval_millis: {v}")))?;
                self.interval = Duration::from_millis(millis);
            }
            if let Some(v) = section.get("rpc_timeout_millis") {
                let millis: u64 = v.parse().map_err(|_| {
                    ChordError::Configuration(format!("invalid rpc_timeout_millis: {v}"))
                })?;
                self.rpc_timeout = Duration::from_millis(millis);
            }
            if let Some(v) = section.get("dev_mode") {
                self.dev_mode = v.parse().unwrap_or(self.dev_mode);
            }
        }
        Ok(())
    }
}
