//! Daemon configuration
//!
//! YAML-based; a minimal config only needs targets. Out-of-range values
//! are coerced rather than rejected (negative buffer sizes, negative
//! offline TTLs), matching what operators expect from the daemon's
//! packaging defaults. Only a genuinely unusable config - unreadable
//! file, invalid YAML, unknown mode, malformed filter entry - fails
//! startup.
//!
//! # Example
//!
//! ```yaml
//! server_config: /etc/zabbix/zabbix_server.conf
//! mode: file
//! data_dir: /var/lib/zshipd
//! buffer_size: 100
//! log_level: INFO
//! http:
//!   listen_address: 0.0.0.0
//!   listen_port: 2020
//! filter:
//!   accepted: ["env:prod"]
//! targets:
//!   - name: audit
//!     type: print
//!     connection: stdout
//!     source: [events]
//!   - name: metrics
//!     type: remote_write
//!     connection: http://mimir:9009/api/v1/push
//!     offline_buffer_time: 24
//!     source: [history, trends]
//! ```

mod error;
mod target;

pub use error::ConfigError;
pub use target::{SinkType, TargetConfig};

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use zship_filter::FilterRule;

/// Ingestion mode: tail export files, or receive them over HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    File,
    Http,
}

/// HTTP listener settings, shared by the HTTP input and the metrics
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_address: String,
    pub listen_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 2020,
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the upstream server's configuration file.
    pub server_config: PathBuf,
    pub mode: Mode,
    /// Root for the offset store and the per-sink offline buffers.
    pub data_dir: PathBuf,
    /// Subject batch size; values <= 0 are coerced to 100.
    pub buffer_size: i64,
    /// Directory scanned for plugin executables. Empty disables plugins.
    pub plugins_dir: Option<PathBuf>,
    /// DEBUG | INFO | WARN | ERROR (default INFO).
    pub log_level: String,
    pub http: HttpConfig,
    /// Global filter applied at every subject.
    pub filter: FilterRule,
    pub targets: Vec<TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_config: PathBuf::from("/etc/zabbix/zabbix_server.conf"),
            mode: Mode::File,
            data_dir: PathBuf::from("/var/lib/zshipd"),
            buffer_size: 100,
            plugins_dir: None,
            log_level: "INFO".to_string(),
            http: HttpConfig::default(),
            filter: FilterRule::default(),
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Load and normalize the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        contents.parse()
    }

    /// The subject batch size after coercion.
    pub fn batch_size(&self) -> usize {
        self.buffer_size as usize
    }

    /// tracing filter directive for the configured level.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.as_str() {
            "DEBUG" => "debug",
            "WARN" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }

    fn normalize(&mut self) {
        if self.buffer_size <= 0 {
            self.buffer_size = 100;
        }
        if self.server_config.as_os_str().is_empty() {
            self.server_config = PathBuf::from("/etc/zabbix/zabbix_server.conf");
        }
        if self.http.listen_port == 0 {
            self.http.listen_port = 2020;
        }
        for target in &mut self.targets {
            target.normalize();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            if target.name.is_empty() {
                return Err(ConfigError::UnnamedTarget { index });
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget {
                    name: target.name.clone(),
                });
            }
            target.validate()?;
        }
        // Filter rules must build; a malformed tag entry is fatal here
        // rather than at first use.
        zship_filter::Filter::from_rule(&self.filter)
            .map_err(|err| ConfigError::InvalidFilter {
                scope: "global".to_string(),
                source: err,
            })?;
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config: Config = serde_yaml::from_str(s)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }
}
