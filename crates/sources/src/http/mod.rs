//! HTTP input - receive NDJSON export streams over HTTP
//!
//! Two POST routes, `/history` and `/events`, each taking one record per
//! line in the corresponding export format. `Content-Encoding` may be
//! `gzip`, `deflate` or `zstd`; anything else is refused with 415. A line
//! that fails to parse is counted and dropped - the request still
//! succeeds. 405 for non-POST methods comes from the method router; a
//! request body that cannot be read or decompressed returns 400.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zship_filter::Filter;
use zship_pipeline::Subject;
use zship_protocol::{Event, ExportKind, History};
use zship_sinks::Sink;

use crate::{Input, SourceError};

use handlers::{handle_events, handle_history};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handler state: the funnels into the two subjects.
pub struct HttpState {
    pub history_tx: mpsc::Sender<History>,
    pub events_tx: mpsc::Sender<Event>,
}

/// Build the ingestion router. Split out of [`HttpInput`] so tests can
/// drive it without a listener.
pub fn http_app(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/history", post(handle_history))
        .route("/events", post(handle_events))
        .with_state(state)
}

struct Running {
    cancel: CancellationToken,
    server: JoinHandle<()>,
    subjects: Vec<JoinHandle<()>>,
}

/// HTTP receiver mode: history and events subjects only (the upstream
/// protocol does not push trends).
pub struct HttpInput {
    listen: SocketAddr,
    history: Option<Subject<History>>,
    events: Option<Subject<Event>>,
    running: Option<Running>,
}

impl HttpInput {
    pub fn new(listen: SocketAddr, batch_size: usize, global_filter: Filter) -> Self {
        Self {
            listen,
            history: Some(Subject::new(batch_size, global_filter.clone())),
            events: Some(Subject::new(batch_size, global_filter)),
            running: None,
        }
    }
}

#[async_trait]
impl Input for HttpInput {
    fn register(&mut self, kind: ExportKind, sink: Arc<dyn Sink>) {
        match kind {
            ExportKind::History => {
                if let Some(subject) = self.history.as_mut() {
                    subject.register(sink);
                }
            }
            ExportKind::Events => {
                if let Some(subject) = self.events.as_mut() {
                    subject.register(sink);
                }
            }
            ExportKind::Trends => {
                tracing::warn!("trends are not received over HTTP, sink not registered");
            }
        }
    }

    /// The HTTP server is always ready once started.
    async fn is_ready(&self) -> bool {
        true
    }

    async fn start(&mut self) -> Result<(), SourceError> {
        let history = self.history.take().expect("input started once").start();
        let events = self.events.take().expect("input started once").start();

        // Materialize the endpoint series so the catalog shows zeros
        // before the first request.
        for endpoint in [ExportKind::History.as_str(), ExportKind::Events.as_str()] {
            zship_metrics::ndjson_lines(endpoint).inc_by(0);
            zship_metrics::ndjson_parse_errors(endpoint).inc_by(0);
        }

        let state = Arc::new(HttpState {
            history_tx: history.sender,
            events_tx: events.sender,
        });

        let listener = TcpListener::bind(self.listen)
            .await
            .map_err(|source| SourceError::Bind {
                addr: self.listen.to_string(),
                source,
            })?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        // One listener carries both ingestion and the metrics exposition.
        let app = http_app(state).merge(zship_metrics::router());
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "HTTP input server failed");
            }
        });

        tracing::info!(listen = %self.listen, "HTTP input listening");
        self.running = Some(Running {
            cancel,
            server,
            subjects: vec![history.task, events.task],
        });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Stop the server first; dropping it releases the channel senders
        // held in the handler state, which closes the subjects.
        running.cancel.cancel();
        if let Err(err) = running.server.await {
            tracing::error!(error = %err, "HTTP server task panicked");
        }

        for task in running.subjects {
            if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
                tracing::warn!("subject did not drain within timeout");
            }
        }
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;
