//! Inputs
//!
//! An input owns the fan-out subjects for the export kinds it produces and
//! feeds them from somewhere:
//!
//! - [`FileInput`] tails the upstream server's rotating NDJSON export
//!   files (one main file plus one per DB syncer, per kind), resuming each
//!   file from its persisted byte offset. Readiness is gated on the
//!   server's HA status.
//! - [`HttpInput`] receives the same NDJSON line formats over HTTP
//!   (`POST /history`, `POST /events`), optionally compressed. Always
//!   ready once started.
//!
//! Sinks are registered per kind before `start()`; `stop()` tears the
//! input down in order: stop producing, persist offsets, close channels,
//! let subjects drain, clean up sinks.

mod file;
mod http;

pub use file::FileInput;
pub use http::{http_app, HttpInput, HttpState};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use zship_protocol::ExportKind;
use zship_sinks::Sink;

#[derive(Debug, Error)]
pub enum SourceError {
    /// File mode requires `ExportDir` to be set upstream.
    #[error("exports are not enabled in the server configuration")]
    ExportsDisabled,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Buffer(#[from] zship_buffer::BufferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The lifecycle every input implements.
#[async_trait]
pub trait Input: Send {
    /// Attach a sink to the subject for `kind`. Unknown or disabled kinds
    /// are ignored with a log line.
    fn register(&mut self, kind: ExportKind, sink: Arc<dyn Sink>);

    /// Whether ingestion may start (HA gate for file mode).
    async fn is_ready(&self) -> bool;

    async fn start(&mut self) -> Result<(), SourceError>;

    async fn stop(&mut self);
}

/// Poll `is_ready` until it reports active, sleeping `delay` between
/// attempts. Ingestion must not start before this returns.
pub async fn wait_until_ready<I: Input + ?Sized>(input: &I, delay: Duration) {
    loop {
        if input.is_ready().await {
            return;
        }
        tracing::info!(delay_secs = delay.as_secs(), "input not ready, waiting");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod wait_test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports ready on the third poll.
    struct FlakyInput {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl Input for FlakyInput {
        fn register(&mut self, _kind: ExportKind, _sink: Arc<dyn Sink>) {}

        async fn is_ready(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) >= 2
        }

        async fn start(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        async fn stop(&mut self) {}
    }

    #[tokio::test]
    async fn waits_until_the_gate_reports_active() {
        let input = FlakyInput {
            polls: AtomicUsize::new(0),
        };
        wait_until_ready(&input, Duration::from_millis(1)).await;
        assert_eq!(input.polls.load(Ordering::SeqCst), 3);
    }
}
