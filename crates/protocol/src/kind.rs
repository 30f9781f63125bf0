//! Export kind identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three export streams produced by the upstream server.
///
/// The string forms (`history`, `trends`, `events`) appear in configuration
/// files, metric labels and buffered-record envelopes, so they are part of
/// the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    History,
    Trends,
    Events,
}

impl ExportKind {
    /// All kinds, in the order the upstream server documents them.
    pub const ALL: [ExportKind; 3] = [ExportKind::History, ExportKind::Trends, ExportKind::Events];

    /// The canonical string form used in config and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::History => "history",
            ExportKind::Trends => "trends",
            ExportKind::Events => "events",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized export kind strings.
#[derive(Debug, Error)]
#[error("unknown export kind '{0}'")]
pub struct UnknownKindError(pub String);

impl FromStr for ExportKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "history" => Ok(ExportKind::History),
            "trends" => Ok(ExportKind::Trends),
            "events" => Ok(ExportKind::Events),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}
