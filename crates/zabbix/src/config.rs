//! Server configuration subset

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use zship_protocol::ExportKind;

use crate::ZabbixError;

static CONFIG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(StartDBSyncers|ExportDir|ExportType|HANodeName)=(.*)$").expect("static regex")
});

/// The slice of `zabbix_server.conf` the shipper cares about.
///
/// Everything else in the file is ignored. Defaults match the server's own:
/// 4 DB syncers, all export types enabled.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path the config was read from; handed back to the server binary for
    /// HA status queries.
    pub config_path: PathBuf,
    /// `ExportDir`. Exports are disabled upstream when unset.
    pub export_dir: Option<PathBuf>,
    /// `ExportType`, comma-separated subset of history/trends/events.
    pub export_types: Vec<ExportKind>,
    /// `StartDBSyncers`.
    pub db_syncers: usize,
    /// `HANodeName`; empty for standalone setups.
    pub node_name: String,
}

impl ServerConfig {
    /// Read and parse the server configuration file.
    pub fn load(path: &Path) -> Result<Self, ZabbixError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ZabbixError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(path, &contents))
    }

    /// Parse the four recognized `Key=Value` lines out of the file body.
    pub fn parse(path: &Path, contents: &str) -> Self {
        let mut conf = Self {
            config_path: path.to_path_buf(),
            export_dir: None,
            export_types: ExportKind::ALL.to_vec(),
            db_syncers: 4,
            node_name: String::new(),
        };

        for line in contents.lines() {
            let Some(caps) = CONFIG_LINE.captures(line) else {
                continue;
            };
            let value = caps[2].trim();
            match &caps[1] {
                "ExportDir" => conf.export_dir = Some(PathBuf::from(value)),
                "ExportType" => {
                    conf.export_types = value
                        .split(',')
                        .filter_map(|part| {
                            let part = part.trim();
                            match part.parse::<ExportKind>() {
                                Ok(kind) => Some(kind),
                                Err(_) => {
                                    tracing::warn!(export = part, "unsupported export type");
                                    None
                                }
                            }
                        })
                        .collect();
                }
                "StartDBSyncers" => {
                    conf.db_syncers = value.parse().unwrap_or(conf.db_syncers);
                }
                "HANodeName" => conf.node_name = value.to_string(),
                _ => {}
            }
        }

        tracing::info!(
            export_dir = ?conf.export_dir,
            syncers = conf.db_syncers,
            node = %conf.node_name,
            "detected server configuration"
        );
        conf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_keys() {
        let body = "\
# Zabbix server configuration\n\
ListenPort=10051\n\
ExportDir=/var/lib/zabbix/export\n\
ExportType=history,events\n\
StartDBSyncers=8\n\
HANodeName=node-a\n";
        let conf = ServerConfig::parse(Path::new("/etc/zabbix/zabbix_server.conf"), body);
        assert_eq!(
            conf.export_dir.as_deref(),
            Some(Path::new("/var/lib/zabbix/export"))
        );
        assert_eq!(conf.export_types, vec![ExportKind::History, ExportKind::Events]);
        assert_eq!(conf.db_syncers, 8);
        assert_eq!(conf.node_name, "node-a");
    }

    #[test]
    fn defaults_when_keys_absent() {
        let conf =
            ServerConfig::parse(Path::new("/etc/zabbix/zabbix_server.conf"), "ListenPort=10051\n");
        assert_eq!(conf.export_dir, None);
        assert_eq!(conf.export_types, ExportKind::ALL.to_vec());
        assert_eq!(conf.db_syncers, 4);
        assert!(conf.node_name.is_empty());
    }

    #[test]
    fn unknown_export_types_are_skipped() {
        let conf = ServerConfig::parse(
            Path::new("/tmp/z.conf"),
            "ExportType=history,audit,trends\n",
        );
        assert_eq!(conf.export_types, vec![ExportKind::History, ExportKind::Trends]);
    }

    #[test]
    fn commented_keys_are_ignored() {
        let conf = ServerConfig::parse(Path::new("/tmp/z.conf"), "# ExportDir=/nope\n");
        assert_eq!(conf.export_dir, None);
    }
}
