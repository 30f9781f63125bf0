//! Pushgateway sink - per-host pushes to a Prometheus pushgateway
//!
//! Maintains one logical pusher per host: numeric history samples are
//! grouped by their owning host, reduced to the latest sample per item, and
//! each host group is pushed as one text-exposition document to
//! `<url>/metrics/job/<job>/host/<host>`.
//!
//! The job name defaults to `zship` and can be overridden with a `job`
//! entry in the target options.

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use zship_protocol::{Event, ExportKind, History, Trend};

use crate::{Sink, SinkCore, SinkError, WriteOutcome};

const DEFAULT_JOB: &str = "zship";

pub struct PushGatewaySink {
    core: SinkCore,
    client: reqwest::Client,
    url: String,
    job: String,
}

impl PushGatewaySink {
    pub fn new(
        core: SinkCore,
        connection: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, SinkError> {
        let url = reqwest::Url::parse(connection)
            .map_err(|err| SinkError::init(format!("invalid pushgateway URL: {err}")))?;

        Ok(Self {
            core,
            client: reqwest::Client::new(),
            url: url.as_str().trim_end_matches('/').to_string(),
            job: options
                .get("job")
                .cloned()
                .unwrap_or_else(|| DEFAULT_JOB.to_string()),
        })
    }

    /// Latest numeric sample per item, rendered in text exposition format.
    fn exposition(records: &[History]) -> String {
        let mut latest: HashMap<i64, &History> = HashMap::new();
        for record in records {
            latest.insert(record.itemid, record);
        }

        let mut body = String::from("# TYPE zabbix_export_value gauge\n");
        let mut items: Vec<_> = latest.into_values().collect();
        items.sort_by_key(|r| r.itemid);
        for record in items {
            let _ = writeln!(
                body,
                "zabbix_export_value{{item=\"{}\",itemid=\"{}\"}} {}",
                escape_label(&record.name),
                record.itemid,
                record.value.as_f64().unwrap_or_default()
            );
        }
        body
    }

    async fn push_host(&self, host: &str, records: &[History]) -> Result<(), SinkError> {
        let url = format!(
            "{}/metrics/job/{}/host/{}",
            self.url, self.job, host
        );
        let response = self
            .client
            .put(&url)
            .header("Content-Type", "text/plain; version=0.0.4")
            .body(Self::exposition(records))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::write(format!(
                "pushgateway returned {} for host {host}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn write_history(&self, batch: Vec<History>) -> WriteOutcome<History> {
        // Group the batch by owning host; one push per host.
        let mut hosts: HashMap<String, Vec<History>> = HashMap::new();
        for record in batch {
            if !record.is_numeric() {
                continue;
            }
            hosts.entry(record.host.host.clone()).or_default().push(record);
        }

        let mut failed = Vec::new();
        let mut error = None;

        for (host, records) in hosts {
            let count = records.len() as u64;
            self.core.record_sent(ExportKind::History, count);
            if let Err(err) = self.push_host(&host, &records).await {
                tracing::error!(sink = %self.core.name(), host = %host, error = %err, "push failed");
                self.core.record_failed(ExportKind::History, count);
                failed.extend(records);
                error = Some(err);
            }
        }

        WriteOutcome { failed, error }
    }
}

#[async_trait]
impl Sink for PushGatewaySink {
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

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
#[path = "pushgateway_test.rs"]
mod pushgateway_test;
