//! The three export record types and their shared trait

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ExportKind, Value, ValueType};

/// A monitored host, with its technical and display names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRef {
    /// Technical host name.
    pub host: String,
    /// Visible name shown in the frontend.
    #[serde(default)]
    pub name: String,
}

/// A key/value tag attached to items and problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub value: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Common surface of the three export record types.
///
/// `key()` returns a byte key that is unique per source record within a
/// kind; it doubles as the offline-buffer key, so its format is stable.
pub trait Export: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: ExportKind;

    fn tags(&self) -> &[Tag];
    fn groups(&self) -> &[String];
    fn key(&self) -> Vec<u8>;

    fn kind_name() -> &'static str {
        Self::KIND.as_str()
    }
}

/// A single collected item value.
///
/// The `value` field mirrors the source token: numeric items carry a JSON
/// number, string/text/log items a JSON string. The four log-only fields
/// are populated only when `value_type` is [`ValueType::Log`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub host: HostRef,
    pub itemid: i64,
    #[serde(default)]
    pub name: String,
    pub clock: i64,
    #[serde(default)]
    pub ns: i64,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "item_tags", default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,

    // Log-only fields.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub severity: i32,
    #[serde(default)]
    pub eventid: i64,
}

impl History {
    /// True when the record carries a numeric sample (FLOAT or UNSIGNED).
    pub fn is_numeric(&self) -> bool {
        self.value_type.is_numeric()
    }
}

impl Export for History {
    const KIND: ExportKind = ExportKind::History;

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn key(&self) -> Vec<u8> {
        format!("history_{}:{}:{}", self.itemid, self.clock, self.ns).into_bytes()
    }
}

/// Hourly rollup of a numeric item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    #[serde(default)]
    pub host: HostRef,
    pub itemid: i64,
    #[serde(default)]
    pub name: String,
    pub clock: i64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub avg: f64,
    #[serde(rename = "item_tags", default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
}

/// The four series a trend record expands into downstream.
pub const TREND_FIELDS: [&str; 4] = ["avg", "min", "max", "count"];

impl Trend {
    /// Rollup field value by series name (one of [`TREND_FIELDS`]).
    pub fn field(&self, name: &str) -> f64 {
        match name {
            "avg" => self.avg,
            "min" => self.min,
            "max" => self.max,
            "count" => self.count as f64,
            _ => f64::NAN,
        }
    }
}

impl Export for Trend {
    const KIND: ExportKind = ExportKind::Trends;

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn key(&self) -> Vec<u8> {
        format!("trend_{}:{}", self.itemid, self.clock).into_bytes()
    }
}

/// A problem or recovery event.
///
/// `value` is 1 for a problem, 0 for a recovery; recoveries reference their
/// problem event through `p_eventid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub clock: i64,
    #[serde(default)]
    pub ns: i64,
    #[serde(default)]
    pub value: i32,
    pub eventid: i64,
    #[serde(rename = "p_eventid", default)]
    pub p_eventid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: i32,
    #[serde(default)]
    pub hosts: Vec<HostRef>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Event {
    pub fn is_problem(&self) -> bool {
        self.value == 1
    }

    pub fn is_recovery(&self) -> bool {
        self.value == 0
    }
}

impl Export for Event {
    const KIND: ExportKind = ExportKind::Events;

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn key(&self) -> Vec<u8> {
        format!("event_{}", self.eventid).into_bytes()
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
