//! Target (sink) declarations

use std::collections::HashMap;

use serde::Deserialize;
use zship_filter::FilterRule;
use zship_protocol::ExportKind;

use crate::ConfigError;

/// Which sink implementation a target uses. Out-of-process sinks are
/// declared as `plugin:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SinkType {
    Print,
    Psql,
    CloudMetric,
    Pushgateway,
    RemoteWrite,
    Plugin(String),
}

impl SinkType {
    /// The `plugin` label this type carries in shipping metrics.
    pub fn label(&self) -> &str {
        match self {
            SinkType::Print => "print",
            SinkType::Psql => "psql",
            SinkType::CloudMetric => "cloud_metric",
            SinkType::Pushgateway => "pushgateway",
            SinkType::RemoteWrite => "remote_write",
            SinkType::Plugin(name) => name,
        }
    }
}

impl TryFrom<String> for SinkType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(plugin) = value.strip_prefix("plugin:") {
            if plugin.is_empty() {
                return Err("empty plugin name in target type".to_string());
            }
            return Ok(SinkType::Plugin(plugin.to_string()));
        }
        match value.as_str() {
            "print" => Ok(SinkType::Print),
            "psql" => Ok(SinkType::Psql),
            "cloud_metric" => Ok(SinkType::CloudMetric),
            "pushgateway" => Ok(SinkType::Pushgateway),
            "remote_write" => Ok(SinkType::RemoteWrite),
            other => Err(format!("target type not supported: {other}")),
        }
    }
}

/// One downstream destination.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub sink_type: SinkType,
    #[serde(default)]
    pub connection: String,
    /// Hours to keep undeliverable records; 0 disables offline buffering.
    /// Negative values are coerced to 0.
    #[serde(default)]
    pub offline_buffer_time: i64,
    /// Per-target filter, applied inside the sink.
    #[serde(default)]
    pub filter: FilterRule,
    /// Export kinds this target subscribes to; empty means all three.
    #[serde(default)]
    pub source: Vec<ExportKind>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl TargetConfig {
    pub(crate) fn normalize(&mut self) {
        if self.offline_buffer_time < 0 {
            tracing::warn!(
                target = %self.name,
                "negative offline_buffer_time coerced to 0"
            );
            self.offline_buffer_time = 0;
        }
        if self.source.is_empty() {
            self.source = ExportKind::ALL.to_vec();
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        zship_filter::Filter::from_rule(&self.filter).map_err(|err| {
            ConfigError::InvalidFilter {
                scope: format!("target '{}'", self.name),
                source: err,
            }
        })?;
        Ok(())
    }
}
