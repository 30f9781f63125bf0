//! High-availability status gate
//!
//! In an HA cluster only the active node writes exports; shipping from a
//! standby would produce nothing (or duplicates after failover). The gate
//! asks the server binary for its HA status and the daemon defers ingestion
//! until the local node reports active.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::ServerConfig;

/// Poll interval used whenever the server output does not provide one.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(60);

/// Header line count of `ha_status` output when no node table follows.
const HEADER_LEN: usize = 3;

const INITIAL_SYNC: &str =
    "Cannot perform specified runtime control command during initial configuration cache sync";
const NON_ACTIVE: &str = "Runtime commands can be executed only in active mode";

static FAILOVER_DELAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Failover delay: (?P<delay>\d+) seconds").expect("static regex"));

// Node table row: "<n>. <id> <name> <heartbeat> <status>"
static NODE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\s+\S+\s+(\S+)\s+\S+\s+(\S+)").expect("static regex"));

/// Parsed interpretation of one `ha_status` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaStatus {
    /// Header-only output: no HA configured, the node is active.
    Standalone,
    /// The runtime command was refused; this node is a standby.
    NotActive,
    /// The server is still syncing its configuration cache.
    InitialSync,
    /// Full cluster table; `active` reflects the row matching our node.
    Cluster { delay: Duration, active: bool },
}

/// What the daemon acts on: whether to start ingesting, and how long to
/// wait before asking again when not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateReport {
    pub active: bool,
    pub delay: Duration,
}

impl From<HaStatus> for GateReport {
    fn from(status: HaStatus) -> Self {
        match status {
            HaStatus::Standalone => GateReport {
                active: true,
                delay: DEFAULT_DELAY,
            },
            HaStatus::NotActive | HaStatus::InitialSync => GateReport {
                active: false,
                delay: DEFAULT_DELAY,
            },
            HaStatus::Cluster { delay, active } => GateReport { active, delay },
        }
    }
}

/// Interpret the textual output of `zabbix_server -R ha_status`.
pub fn parse_ha_status(output: &str, node_name: &str) -> HaStatus {
    let output = output.trim_end_matches('\n');
    if output == INITIAL_SYNC {
        return HaStatus::InitialSync;
    }

    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() == HEADER_LEN {
        return HaStatus::Standalone;
    }
    if lines[0] == NON_ACTIVE {
        return HaStatus::NotActive;
    }

    let delay = FAILOVER_DELAY
        .captures(lines[0])
        .and_then(|caps| caps["delay"].parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_DELAY);

    let mut active = false;
    for line in lines.iter().skip(HEADER_LEN) {
        if let Some(caps) = NODE_ROW.captures(line) {
            let name = caps[1].trim();
            let status = caps[2].trim();
            if name == node_name && status == "active" {
                active = true;
            }
        }
    }

    HaStatus::Cluster { delay, active }
}

/// Readiness probe against the upstream server's runtime-control interface.
pub struct HaGate {
    config: ServerConfig,
}

impl HaGate {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run one `ha_status` query. Failures to execute the server binary are
    /// reported as not-active so the caller keeps polling.
    pub async fn probe(&self) -> GateReport {
        let output = Command::new("zabbix_server")
            .arg("-c")
            .arg(&self.config.config_path)
            .arg("-R")
            .arg("ha_status")
            .output()
            .await;

        let output = match output {
            Ok(out) => out,
            Err(err) => {
                tracing::error!(error = %err, "failed to query HA status");
                return GateReport {
                    active: false,
                    delay: DEFAULT_DELAY,
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let status = parse_ha_status(&stdout, &self.config.node_name);
        match &status {
            HaStatus::Standalone => tracing::info!("node running in standalone mode"),
            HaStatus::NotActive => tracing::info!("node in non-active mode"),
            HaStatus::InitialSync => tracing::info!("waiting for initial configuration cache sync"),
            HaStatus::Cluster { active, .. } => {
                tracing::info!(node = %self.config.node_name, active, "HA cluster status")
            }
        }
        status.into()
    }
}

#[cfg(test)]
#[path = "ha_test.rs"]
mod ha_test;
