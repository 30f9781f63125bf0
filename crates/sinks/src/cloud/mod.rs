//! Cloud metric sink - batched time-series writes to a cloud monitoring API
//!
//! Sends numeric history samples as custom metric time series. The API
//! accepts at most one point per series per write, so records are grouped
//! by item id; when a batch contains a second sample for an item already in
//! the current group, the group is flushed and restarted. Non-numeric
//! records are silently skipped.
//!
//! The connection string is the write endpoint URL; an optional `token`
//! entry in the target options is sent as a bearer token.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zship_protocol::{Event, ExportKind, History, Trend};

use crate::{Sink, SinkCore, SinkError, WriteOutcome};

#[derive(Debug, Serialize)]
struct TimeSeries {
    metric: Metric,
    resource: Resource,
    points: Vec<Point>,
}

#[derive(Debug, Serialize)]
struct Metric {
    #[serde(rename = "type")]
    metric_type: String,
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Resource {
    #[serde(rename = "type")]
    resource_type: String,
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Point {
    interval: Interval,
    value: TypedValue,
}

#[derive(Debug, Serialize)]
struct Interval {
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Serialize)]
struct TypedValue {
    double_value: f64,
}

#[derive(Debug, Serialize)]
struct WriteRequest {
    time_series: Vec<TimeSeries>,
}

/// Per-write summary returned by the API; `errors` describes rejected
/// points in aggregate.
#[derive(Debug, Default, Deserialize)]
struct WriteSummary {
    #[serde(default)]
    total_point_count: usize,
    #[serde(default)]
    success_point_count: usize,
}

/// Cloud monitoring sink. History only (trends and events have no
/// time-series shape here and are accepted as no-ops).
pub struct CloudMetricSink {
    core: SinkCore,
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    resource: Resource,
}

impl CloudMetricSink {
    pub fn new(
        core: SinkCore,
        connection: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, SinkError> {
        if connection.is_empty() {
            return Err(SinkError::init("cloud metric sink requires an endpoint URL"));
        }

        let mut labels = HashMap::new();
        labels.insert("location".to_string(), "global".to_string());
        labels.insert("namespace".to_string(), "default".to_string());
        labels.insert("job".to_string(), "zabbix-export".to_string());

        Ok(Self {
            core,
            client: reqwest::Client::new(),
            endpoint: connection.to_string(),
            token: options.get("token").cloned(),
            resource: Resource {
                resource_type: "generic_task".to_string(),
                labels,
            },
        })
    }

    fn time_series(&self, record: &History) -> TimeSeries {
        let mut labels = HashMap::new();
        labels.insert("item".to_string(), record.name.clone());
        labels.insert("itemid".to_string(), record.itemid.to_string());
        labels.insert("host".to_string(), record.host.host.clone());

        TimeSeries {
            metric: Metric {
                metric_type: format!("custom.googleapis.com/zabbix_item_{}", record.itemid),
                labels,
            },
            resource: Resource {
                resource_type: self.resource.resource_type.clone(),
                labels: self.resource.labels.clone(),
            },
            points: vec![Point {
                interval: Interval {
                    start_time: record.clock,
                    end_time: record.clock,
                },
                value: TypedValue {
                    double_value: record.value.as_f64().unwrap_or_default(),
                },
            }],
        }
    }

    /// Send one accumulated group. On success returns the subset the API
    /// rejected (from its per-point summary); on failure hands the whole
    /// group back alongside the error.
    async fn push_group(
        &self,
        group: &mut HashMap<i64, (History, TimeSeries)>,
    ) -> Result<Vec<History>, (Vec<History>, SinkError)> {
        if group.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(group.len());
        let mut series = Vec::with_capacity(group.len());
        for (_, (record, ts)) in group.drain() {
            records.push(record);
            series.push(ts);
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&WriteRequest { time_series: series });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Err((records, err.into())),
        };
        if !response.status().is_success() {
            let err = SinkError::write(format!(
                "time-series write returned {}",
                response.status()
            ));
            return Err((records, err));
        }

        // Per-point summary: the API reports how many points it kept.
        let summary: WriteSummary = response.json().await.unwrap_or_default();
        let rejected = summary
            .total_point_count
            .saturating_sub(summary.success_point_count)
            .min(records.len());
        Ok(records.split_off(records.len() - rejected))
    }

    async fn write_history(&self, batch: Vec<History>) -> WriteOutcome<History> {
        let mut group: HashMap<i64, (History, TimeSeries)> = HashMap::new();
        let mut failed = Vec::new();
        let mut records = batch.into_iter();

        while let Some(record) = records.next() {
            if !record.is_numeric() {
                continue;
            }
            if group.contains_key(&record.itemid) {
                // One point per series per write: flush and start over.
                match self.push_group(&mut group).await {
                    Ok(rejected) => {
                        self.core.record_failed(ExportKind::History, rejected.len() as u64);
                        failed.extend(rejected);
                    }
                    Err((all, err)) => {
                        self.core
                            .record_failed(ExportKind::History, (all.len() + 1) as u64);
                        failed.extend(all);
                        failed.push(record);
                        // Nothing downstream of a dead endpoint: the rest of
                        // the batch fails with it.
                        failed.extend(records.filter(History::is_numeric));
                        return WriteOutcome { failed, error: Some(err) };
                    }
                }
            }
            let series = self.time_series(&record);
            self.core.record_sent(ExportKind::History, 1);
            group.insert(record.itemid, (record, series));
        }

        match self.push_group(&mut group).await {
            Ok(rejected) => {
                self.core.record_failed(ExportKind::History, rejected.len() as u64);
                failed.extend(rejected);
                WriteOutcome { failed, error: None }
            }
            Err((all, err)) => {
                self.core.record_failed(ExportKind::History, all.len() as u64);
                failed.extend(all);
                WriteOutcome { failed, error: Some(err) }
            }
        }
    }
}

#[async_trait]
impl Sink for CloudMetricSink {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn save_history(&self, batch: Vec<History>) -> bool {
        self.core
            .save_with_retry(batch, |b| self.write_history(b))
            .await
    }

    async fn save_trends(&self, _batch: Vec<Trend>) -> bool {
        true
    }

    async fn save_events(&self, _batch: Vec<Event>) -> bool {
        true
    }

    async fn cleanup(&self) {
        self.core.close();
    }
}
