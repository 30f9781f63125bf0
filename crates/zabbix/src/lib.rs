//! Upstream server integration
//!
//! The daemon does not speak to the Zabbix server over its API; it reads
//! three things from the server's world:
//!
//! - the server configuration file (only the four keys that shape exports:
//!   `ExportDir`, `ExportType`, `StartDBSyncers`, `HANodeName`),
//! - the export file layout derived from that configuration,
//! - the node's high-availability status, obtained by shelling out to the
//!   server's runtime-control interface (`zabbix_server -R ha_status`).

mod config;
mod ha;
mod paths;

pub use config::ServerConfig;
pub use ha::{parse_ha_status, GateReport, HaGate, HaStatus, DEFAULT_DELAY};
pub use paths::export_files;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZabbixError {
    #[error("cannot read server config '{path}': {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
