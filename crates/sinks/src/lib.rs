//! Downstream sinks
//!
//! A sink is a destination for export records: it receives whole batches
//! from the fan-out subjects, applies its local filter, writes, and parks
//! anything it could not deliver in its offline buffer (when one is
//! configured) for replay on the next successful write.
//!
//! The [`Sink`] trait is the uniform contract; [`SinkCore`] carries the
//! cross-cutting machinery (name, filter, buffer, shipping counters, the
//! save-with-retry protocol) so each implementation only supplies its
//! `write_*` functions.
//!
//! Bundled sinks:
//!
//! - [`print::PrintSink`] - one formatted line per record to stdout/stderr
//! - [`psql::PostgresSink`] - transactional inserts into a fixed schema
//! - [`cloud::CloudMetricSink`] - batched time-series writes to a cloud
//!   monitoring API
//! - [`pushgateway::PushGatewaySink`] - per-host pushes to a Prometheus
//!   pushgateway
//! - [`remote_write::RemoteWriteSink`] - Prometheus remote-write protocol

pub mod cloud;
mod common;
pub mod print;
pub mod psql;
pub mod pushgateway;
pub mod remote_write;

pub use common::{SinkCore, SinkError, WriteOutcome};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use zship_protocol::{Event, Export, History, Trend};

/// The uniform sink contract.
///
/// Each `save_*` call returns an overall success indicator; per-record
/// failures are reported through the shipping counters and the sink's own
/// offline buffer, never by failing the call.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Configured target name (unique across targets).
    fn name(&self) -> &str;

    async fn save_history(&self, batch: Vec<History>) -> bool;
    async fn save_trends(&self, batch: Vec<Trend>) -> bool;
    async fn save_events(&self, batch: Vec<Event>) -> bool;

    /// Release connections, flush and close the offline buffer.
    async fn cleanup(&self);
}

/// Kind-directed dispatch of a batch to a sink, as its own task.
///
/// Subjects fire these without awaiting them; a slow sink must never block
/// the pipeline.
pub trait SinkDispatch: Export {
    fn dispatch(sink: Arc<dyn Sink>, batch: Vec<Self>) -> JoinHandle<bool>;
}

impl SinkDispatch for History {
    fn dispatch(sink: Arc<dyn Sink>, batch: Vec<Self>) -> JoinHandle<bool> {
        tokio::spawn(async move { sink.save_history(batch).await })
    }
}

impl SinkDispatch for Trend {
    fn dispatch(sink: Arc<dyn Sink>, batch: Vec<Self>) -> JoinHandle<bool> {
        tokio::spawn(async move { sink.save_trends(batch).await })
    }
}

impl SinkDispatch for Event {
    fn dispatch(sink: Arc<dyn Sink>, batch: Vec<Self>) -> JoinHandle<bool> {
        tokio::spawn(async move { sink.save_events(batch).await })
    }
}
