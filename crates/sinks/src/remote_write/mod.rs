//! Remote-write sink - Prometheus remote-write protocol
//!
//! Encodes export records as a snappy-compressed protobuf `WriteRequest`:
//!
//! - history: one series per item id, numeric records only;
//! - trends: one series per (item id, rollup field) with a `trend_type`
//!   label, so each hour contributes avg/min/max/count points.
//!
//! Samples within a series are sorted by timestamp before the write; the
//! protocol requires ascending order per series. Timestamps are
//! milliseconds since epoch.

mod prompb;

use std::collections::HashMap;

use async_trait::async_trait;
use prost::Message;
use zship_protocol::{Event, ExportKind, History, Trend, TREND_FIELDS};

use prompb::{Label, Sample, TimeSeries, WriteRequest};

use crate::{Sink, SinkCore, SinkError, WriteOutcome};

pub struct RemoteWriteSink {
    core: SinkCore,
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteWriteSink {
    pub fn new(core: SinkCore, connection: &str) -> Result<Self, SinkError> {
        let url = reqwest::Url::parse(connection)
            .map_err(|err| SinkError::init(format!("invalid remote-write URL: {err}")))?;
        Ok(Self {
            core,
            client: reqwest::Client::new(),
            endpoint: url.to_string(),
        })
    }

    async fn post(&self, request: WriteRequest) -> Result<(), SinkError> {
        let raw = request.encode_to_vec();
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&raw)
            .map_err(|err| SinkError::write(format!("snappy compression failed: {err}")))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/x-protobuf")
            .header("Content-Encoding", "snappy")
            .header("X-Prometheus-Remote-Write-Version", "0.1.0")
            .body(compressed)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::write(format!(
                "remote write returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn write_history(&self, batch: Vec<History>) -> WriteOutcome<History> {
        let numeric: Vec<History> = batch.into_iter().filter(History::is_numeric).collect();
        if numeric.is_empty() {
            return WriteOutcome::ok();
        }
        let count = numeric.len() as u64;
        let request = history_write_request(&numeric);

        match self.post(request).await {
            Ok(()) => {
                self.core.record_sent(ExportKind::History, count);
                WriteOutcome::ok()
            }
            Err(err) => {
                self.core.record_failed(ExportKind::History, count);
                WriteOutcome::failed(numeric, err)
            }
        }
    }

    async fn write_trends(&self, batch: Vec<Trend>) -> WriteOutcome<Trend> {
        if batch.is_empty() {
            return WriteOutcome::ok();
        }
        let count = batch.len() as u64;
        let request = trend_write_request(&batch);

        match self.post(request).await {
            Ok(()) => {
                self.core.record_sent(ExportKind::Trends, count);
                WriteOutcome::ok()
            }
            Err(err) => {
                self.core.record_failed(ExportKind::Trends, count);
                WriteOutcome::failed(batch, err)
            }
        }
    }
}

#[async_trait]
impl Sink for RemoteWriteSink {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn save_history(&self, batch: Vec<History>) -> bool {
        self.core
            .save_with_retry(batch, |b| self.write_history(b))
            .await
    }

    async fn save_trends(&self, batch: Vec<Trend>) -> bool {
        self.core
            .save_with_retry(batch, |b| self.write_trends(b))
            .await
    }

    async fn save_events(&self, _batch: Vec<Event>) -> bool {
        true
    }

    async fn cleanup(&self) {
        self.core.close();
    }
}

/// Milliseconds since epoch from a (seconds, nanoseconds) pair.
fn timestamp_ms(clock: i64, ns: i64) -> i64 {
    clock * 1000 + ns / 1_000_000
}

fn series_labels(export: &str, host: &str, itemid: i64, item_name: &str) -> Vec<Label> {
    vec![
        Label {
            name: "__name__".to_string(),
            value: format!("zabbix_{export}_export"),
        },
        Label {
            name: "host".to_string(),
            value: host.to_string(),
        },
        Label {
            name: "item_id".to_string(),
            value: itemid.to_string(),
        },
        Label {
            name: "item_name".to_string(),
            value: item_name.to_string(),
        },
    ]
}

/// Group numeric history records into one series per item id.
fn history_write_request(records: &[History]) -> WriteRequest {
    let mut series: HashMap<i64, TimeSeries> = HashMap::new();

    for record in records {
        let sample = Sample {
            value: record.value.as_f64().unwrap_or_default(),
            timestamp: timestamp_ms(record.clock, record.ns),
        };
        series
            .entry(record.itemid)
            .or_insert_with(|| TimeSeries {
                labels: series_labels("history", &record.host.host, record.itemid, &record.name),
                samples: Vec::new(),
            })
            .samples
            .push(sample);
    }

    finish(series.into_values())
}

/// Expand trends into one series per (item id, rollup field).
fn trend_write_request(records: &[Trend]) -> WriteRequest {
    let mut series: HashMap<(i64, &str), TimeSeries> = HashMap::new();

    for record in records {
        let timestamp = timestamp_ms(record.clock, 0);
        for field in TREND_FIELDS {
            let sample = Sample {
                value: record.field(field),
                timestamp,
            };
            series
                .entry((record.itemid, field))
                .or_insert_with(|| {
                    let mut labels =
                        series_labels("trends", &record.host.host, record.itemid, &record.name);
                    labels.push(Label {
                        name: "trend_type".to_string(),
                        value: field.to_string(),
                    });
                    TimeSeries {
                        labels,
                        samples: Vec::new(),
                    }
                })
                .samples
                .push(sample);
        }
    }

    finish(series.into_values())
}

/// Senders MUST write samples for any given series in timestamp order.
fn finish(series: impl Iterator<Item = TimeSeries>) -> WriteRequest {
    let mut timeseries: Vec<TimeSeries> = series.collect();
    for ts in &mut timeseries {
        ts.samples.sort_by_key(|s| s.timestamp);
    }
    WriteRequest { timeseries }
}
