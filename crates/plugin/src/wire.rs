//! Wire protocol: handshake constants and RPC message types
//!
//! Frames are 4-byte length-prefixed JSON. Record payloads reuse the
//! protocol types directly, so the value of a history record crosses the
//! wire as the same number-or-string union it was parsed from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zship_filter::FilterRule;
use zship_protocol::{Event, ExportKind, History, Trend};

use crate::PluginError;

/// Bumped on incompatible protocol changes; both sides must agree.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable the host sets when launching a plugin.
pub const COOKIE_KEY: &str = "ZSHIP_PLUGIN";

/// Expected value of [`COOKIE_KEY`]. Lets a plugin binary refuse to run
/// outside a host process.
pub const COOKIE_VALUE: &str = "zabbix-export-shipper";

/// The single line a plugin prints on stdout once it is listening.
pub fn handshake_line(socket: &Path) -> String {
    format!("{PROTOCOL_VERSION}|{}", socket.display())
}

/// Parse the handshake line into (protocol version, socket path).
pub fn parse_handshake(line: &str) -> Result<(u32, PathBuf), PluginError> {
    let (version, path) = line
        .trim()
        .split_once('|')
        .ok_or_else(|| PluginError::Handshake(format!("malformed handshake line '{line}'")))?;
    let version = version
        .parse::<u32>()
        .map_err(|_| PluginError::Handshake(format!("non-numeric protocol version '{version}'")))?;
    if path.is_empty() {
        return Err(PluginError::Handshake("empty socket path".to_string()));
    }
    Ok((version, PathBuf::from(path)))
}

/// Descriptive metadata a plugin returns from `Initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
}

/// Everything a plugin needs to configure itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Target name from the daemon config.
    pub name: String,
    /// Plugin-specific connection string.
    pub connection: String,
    /// Plugin-specific option map.
    pub options: HashMap<String, String>,
    /// Export kinds this target subscribed to.
    pub kinds: Vec<ExportKind>,
    /// The target's filter rule, for plugin-side filtering.
    pub filter: FilterRule,
}

/// Host-to-plugin calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    Initialize(InitializeRequest),
    SaveHistory { records: Vec<History> },
    SaveTrends { records: Vec<Trend> },
    SaveEvents { records: Vec<Event> },
    Cleanup,
}

/// Plugin-to-host results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", content = "body")]
pub enum Reply {
    Initialized {
        success: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        info: Option<PluginInfo>,
    },
    Saved {
        success: bool,
        processed: u64,
        failed: u64,
        #[serde(default)]
        error: Option<String>,
    },
    CleanedUp {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// A request with its correlation id.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub request: Request,
}

/// A reply with the id of the request it answers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub id: u64,
    pub reply: Reply,
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;
