//! Shared sink machinery: errors, write outcomes and the save-with-retry core

use std::future::Future;

use thiserror::Error;
use zship_buffer::{BufferError, OfflineBuffer};
use zship_filter::Filter;
use zship_metrics::ShippingCounters;
use zship_protocol::{Export, ExportKind};

/// Errors a sink write can produce.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to initialize sink: {0}")]
    Init(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The downstream accepted the request but rejected some points.
    #[error("downstream rejected {rejected} of {total} points")]
    PartialWrite { rejected: usize, total: usize },
}

impl SinkError {
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}

/// Result of one internal write attempt: the records that did not make it,
/// and the error that stopped them (if any).
pub struct WriteOutcome<T> {
    pub failed: Vec<T>,
    pub error: Option<SinkError>,
}

impl<T> WriteOutcome<T> {
    pub fn ok() -> Self {
        Self {
            failed: Vec::new(),
            error: None,
        }
    }

    pub fn failed(failed: Vec<T>, error: SinkError) -> Self {
        Self {
            failed,
            error: Some(error),
        }
    }
}

/// The cross-cutting half of every sink: identity, local filter, offline
/// buffer and the shipping counter pairs for the enabled export kinds.
pub struct SinkCore {
    name: String,
    filter: Filter,
    buffer: OfflineBuffer,
    history: Option<ShippingCounters>,
    trends: Option<ShippingCounters>,
    events: Option<ShippingCounters>,
}

impl SinkCore {
    /// Assemble the core for a target. `plugin` is the sink type label used
    /// in metrics (`print`, `psql`, a plugin name, ...); counters exist only
    /// for the kinds the target subscribed to.
    pub fn new(
        name: impl Into<String>,
        plugin: &str,
        filter: Filter,
        buffer: OfflineBuffer,
        enabled: &[ExportKind],
    ) -> Self {
        let name = name.into();
        let counters = |kind: ExportKind| {
            enabled
                .contains(&kind)
                .then(|| ShippingCounters::new(&name, plugin, kind.as_str()))
        };
        Self {
            history: counters(ExportKind::History),
            trends: counters(ExportKind::Trends),
            events: counters(ExportKind::Events),
            name,
            filter,
            buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &OfflineBuffer {
        &self.buffer
    }

    fn counters(&self, kind: ExportKind) -> Option<&ShippingCounters> {
        match kind {
            ExportKind::History => self.history.as_ref(),
            ExportKind::Trends => self.trends.as_ref(),
            ExportKind::Events => self.events.as_ref(),
        }
    }

    /// Count records handed to the downstream.
    pub fn record_sent(&self, kind: ExportKind, n: u64) {
        if let Some(c) = self.counters(kind) {
            c.sent.inc_by(n);
        }
    }

    /// Count records the downstream did not take.
    pub fn record_failed(&self, kind: ExportKind, n: u64) {
        if let Some(c) = self.counters(kind) {
            c.failed.inc_by(n);
        }
    }

    /// The save protocol shared by every sink and export kind:
    ///
    /// 1. Drop records the local filter rejects.
    /// 2. Attempt the write; on error, park the failed subset in the
    ///    offline buffer (when buffering is enabled).
    /// 3. On success, fetch up to the batch size of previously parked
    ///    records, retry them, and on a successful retry delete everything
    ///    fetched - regardless of per-record outcome. That policy trades
    ///    possible loss inside the retried subset for bounded buffer
    ///    growth.
    ///
    /// Always reports overall success to the caller; accounting happens via
    /// the shipping counters inside the write functions.
    pub async fn save_with_retry<T, F, Fut>(&self, batch: Vec<T>, mut write: F) -> bool
    where
        T: Export,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = WriteOutcome<T>>,
    {
        let accepted = self.filter.filter_batch(batch);
        let requested = accepted.len();
        let outcome = write(accepted).await;

        if let Some(err) = &outcome.error {
            tracing::error!(sink = %self.name, error = %err, "sink write failed");
        }

        if !self.buffer.is_enabled() {
            return true;
        }

        if outcome.error.is_some() {
            if let Err(err) = self.buffer.put(&outcome.failed) {
                tracing::error!(sink = %self.name, error = %err, "failed to park records in offline buffer");
            }
            return true;
        }

        match self.buffer.fetch::<T>(requested.max(1)) {
            Ok(queued) if !queued.is_empty() => {
                let count = queued.len();
                let retry = write(queued.clone()).await;
                if retry.error.is_none() {
                    if let Err(err) = self.buffer.delete(&queued) {
                        tracing::error!(sink = %self.name, error = %err, "failed to clear replayed records");
                    } else {
                        tracing::debug!(sink = %self.name, count, "replayed buffered records");
                    }
                } else {
                    tracing::error!(sink = %self.name, "failed to re-send buffered records");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(sink = %self.name, error = %err, "failed to read offline buffer");
            }
        }
        true
    }

    /// Close the offline buffer.
    pub fn close(&self) {
        self.buffer.close();
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
