use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::allowlist::{AllowList, DEFAULT_ALLOWLIST_CAPACITY};
use crate::ring::DEFAULT_RING_BYTES;

/// Pipeline configuration, loadable from CLI or YAML file.
///
/// Everything here is supplied by the operator at startup; the running fast
/// path never re-reads it. Later allow-list changes go through the
/// [`AllowList`] control interface directly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Telemetry channel budget in bytes. Must be a power of two.
    #[serde(default = "default_ring_bytes")]
    pub ring_bytes: usize,

    /// Maximum number of allow-list entries.
    #[serde(default = "default_allow_capacity")]
    pub allow_capacity: usize,

    /// Source addresses permitted at startup (dotted quad).
    #[serde(default)]
    pub allowed_ips: Vec<String>,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,
}

fn default_ring_bytes() -> usize {
    DEFAULT_RING_BYTES
}

fn default_allow_capacity() -> usize {
    DEFAULT_ALLOWLIST_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ring_bytes: default_ring_bytes(),
            allow_capacity: default_allow_capacity(),
            allowed_ips: Vec::new(),
            quiet: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if let Some(ring_bytes) = cli.ring_bytes {
            self.ring_bytes = ring_bytes;
        }
        if let Some(allow_capacity) = cli.allow_capacity {
            self.allow_capacity = allow_capacity;
        }
        if !cli.allow.is_empty() {
            self.allowed_ips = cli.allow.clone();
        }
        if cli.quiet {
            self.quiet = true;
        }
    }

    /// Reject values the pipeline constructors would panic on.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.ring_bytes.is_power_of_two(),
            "ring_bytes must be a power of two, got {}",
            self.ring_bytes
        );
        anyhow::ensure!(self.allow_capacity > 0, "allow_capacity must be non-zero");
        Ok(())
    }

    /// Build a fresh allow-list seeded with the configured addresses.
    pub fn build_allowlist(&self) -> anyhow::Result<AllowList> {
        let allow = AllowList::with_capacity(self.allow_capacity);
        for ip in &self.allowed_ips {
            let addr: Ipv4Addr = ip
                .parse()
                .with_context(|| format!("invalid allow-list address {ip:?}"))?;
            allow.set(u32::from(addr), true)?;
        }
        Ok(allow)
    }
}

use clap::Parser;

/// flowgate: packet admission & telemetry pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to YAML config file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Telemetry channel budget in bytes (power of two).
    #[arg(long)]
    pub ring_bytes: Option<usize>,

    /// Maximum number of allow-list entries.
    #[arg(long)]
    pub allow_capacity: Option<usize>,

    /// Source IP permitted at startup. Repeat for multiple.
    #[arg(long)]
    pub allow: Vec<String>,

    /// Rounds of synthetic traffic the demo pushes through the engine.
    #[arg(long, default_value_t = 16)]
    pub rounds: u32,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
