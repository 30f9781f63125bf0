//! Relational sink - transactional inserts into PostgreSQL
//!
//! Writes history records into a fixed schema
//! (`performance.messages(tagname, value, quality, timestamp,
//! servertimestamp)`), one prepared insert per record inside a single
//! transaction. Any per-record failure rolls back the whole batch; commit
//! success counts every record in the batch as shipped.
//!
//! Pool tuning comes from the target's option map:
//!
//! | Option | Effect |
//! |---|---|
//! | `max_conn` | maximum pool connections |
//! | `max_idle` | connections kept open when idle |
//! | `max_conn_time` | connection lifetime, seconds |
//! | `max_idle_time` | idle timeout, seconds |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use prometheus::Gauge;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use zship_protocol::{Event, ExportKind, History, Trend};

use crate::{Sink, SinkCore, SinkError, WriteOutcome};

const INSERT: &str = "INSERT INTO performance.messages \
    (tagname, value, quality, timestamp, servertimestamp) \
    VALUES ($1, $2, $3, $4, $5)";

/// PostgreSQL sink. History only; trend and event batches are accepted and
/// ignored.
pub struct PostgresSink {
    core: SinkCore,
    pool: PgPool,
    max_connections: u32,
    idle_gauge: Gauge,
    max_gauge: Gauge,
    used_gauge: Gauge,
}

impl PostgresSink {
    /// Connect and verify the database is reachable. A failed connection is
    /// an initialization error; the target will not be registered.
    pub async fn connect(
        core: SinkCore,
        connection: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, SinkError> {
        let mut pool_options = PgPoolOptions::new();
        let mut max_connections = 10u32;

        for (option, value) in options {
            match option.as_str() {
                "max_conn" => {
                    if let Ok(n) = value.parse() {
                        max_connections = n;
                    }
                }
                "max_idle" => {
                    if let Ok(n) = value.parse() {
                        pool_options = pool_options.min_connections(n);
                    }
                }
                "max_conn_time" => {
                    if let Ok(secs) = value.parse() {
                        pool_options = pool_options.max_lifetime(Duration::from_secs(secs));
                    }
                }
                "max_idle_time" => {
                    if let Ok(secs) = value.parse() {
                        pool_options = pool_options.idle_timeout(Duration::from_secs(secs));
                    }
                }
                _ => {}
            }
        }

        let pool = pool_options
            .max_connections(max_connections)
            .connect(connection)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;

        let gauge = |conn: &str| {
            zship_metrics::psql_connections(core.name(), "psql", conn)
        };
        let sink = Self {
            idle_gauge: gauge("idle"),
            max_gauge: gauge("max"),
            used_gauge: gauge("used"),
            core,
            pool,
            max_connections,
        };
        sink.update_stats();
        Ok(sink)
    }

    fn update_stats(&self) {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as f64;
        self.idle_gauge.set(idle);
        self.used_gauge.set(size as f64 - idle);
        self.max_gauge.set(self.max_connections as f64);
    }

    async fn write_history(&self, batch: Vec<History>) -> WriteOutcome<History> {
        let total = batch.len() as u64;
        self.update_stats();

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                self.core.record_failed(ExportKind::History, total);
                return WriteOutcome::failed(batch, err.into());
            }
        };

        for index in 0..batch.len() {
            let record = &batch[index];
            let tag = format!("{}.{}.{}", record.host.host, record.host.host, record.name);
            let stamp = DateTime::from_timestamp(record.clock, 0)
                .map(|dt| dt.naive_utc())
                .unwrap_or_default();

            let result = sqlx::query(INSERT)
                .bind(tag)
                .bind(record.value.to_string())
                .bind(true)
                .bind(stamp)
                .bind(stamp)
                .execute(&mut *tx)
                .await;

            if let Err(err) = result {
                // One bad record fails the whole batch.
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(sink = %self.core.name(), error = %rollback, "rollback failed");
                }
                self.core.record_failed(ExportKind::History, total);
                return WriteOutcome::failed(batch, err.into());
            }
        }

        if let Err(err) = tx.commit().await {
            self.core.record_failed(ExportKind::History, total);
            return WriteOutcome::failed(batch, err.into());
        }

        self.core.record_sent(ExportKind::History, total);
        self.update_stats();
        WriteOutcome::ok()
    }
}

#[async_trait]
impl Sink for PostgresSink {
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
        self.pool.close().await;
        self.core.close();
    }
}
