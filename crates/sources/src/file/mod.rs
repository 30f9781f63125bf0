//! File input - tail the upstream server's export files
//!
//! One tailer task per export file (main + syncers per kind, plus the
//! events task-manager file), all feeding the per-kind subject through a
//! bounded channel. Byte offsets are looked up at startup and persisted at
//! shutdown in the shared offset store, so a restart resumes where the
//! previous run stopped.

mod tailer;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zship_buffer::OffsetStore;
use zship_filter::Filter;
use zship_pipeline::Subject;
use zship_protocol::{Event, Export, ExportKind, History, Trend};
use zship_sinks::{Sink, SinkDispatch};
use zship_zabbix::{export_files, HaGate, ServerConfig};

use crate::{Input, SourceError};

use tailer::TailerHandle;

/// Bound on how long `stop()` waits for subjects to drain once the
/// channels are closed. Offsets are already persisted by then.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    offsets: OffsetStore,
    cancel: CancellationToken,
    tailers: Vec<TailerHandle>,
    subjects: Vec<JoinHandle<()>>,
}

/// Tails the export files of every kind enabled upstream. Readiness
/// follows the server's HA status.
pub struct FileInput {
    server: ServerConfig,
    data_dir: PathBuf,
    batch_size: usize,
    gate: HaGate,
    history: Option<Subject<History>>,
    trends: Option<Subject<Trend>>,
    events: Option<Subject<Event>>,
    running: Option<Running>,
}

impl FileInput {
    /// Build the input and its subjects. Fails when exports are disabled
    /// upstream (no `ExportDir`).
    pub fn new(
        server: ServerConfig,
        data_dir: PathBuf,
        batch_size: usize,
        global_filter: Filter,
    ) -> Result<Self, SourceError> {
        if server.export_dir.is_none() {
            return Err(SourceError::ExportsDisabled);
        }

        let enabled = |kind: ExportKind| server.export_types.contains(&kind);
        let history = enabled(ExportKind::History)
            .then(|| Subject::new(batch_size, global_filter.clone()));
        let trends =
            enabled(ExportKind::Trends).then(|| Subject::new(batch_size, global_filter.clone()));
        let events =
            enabled(ExportKind::Events).then(|| Subject::new(batch_size, global_filter.clone()));

        Ok(Self {
            gate: HaGate::new(server.clone()),
            server,
            data_dir,
            batch_size,
            history,
            trends,
            events,
            running: None,
        })
    }

    /// Start one kind: launch its subject and a tailer per export file.
    fn start_kind<T: Export + SinkDispatch>(
        subject: Subject<T>,
        files: Vec<PathBuf>,
        offsets: &OffsetStore,
        cancel: &CancellationToken,
        tailers: &mut Vec<TailerHandle>,
        subjects: &mut Vec<JoinHandle<()>>,
    ) {
        let handle = subject.start();
        subjects.push(handle.task);

        for (file_index, path) in files.into_iter().enumerate() {
            let start_offset = resume_offset(offsets, &path);
            tailers.push(tailer::spawn::<T>(
                path,
                file_index,
                start_offset,
                handle.sender.clone(),
                cancel.clone(),
            ));
        }
        // The tailers hold the only senders now; when they stop, the
        // subject drains and cleans up.
        drop(handle.sender);
    }
}

/// Persisted offset for `path`, reset to 0 when it exceeds the current
/// file size (the file was rotated while we were away) or cannot be read.
fn resume_offset(offsets: &OffsetStore, path: &PathBuf) -> u64 {
    let stored = match offsets.get(path) {
        Ok(stored) => stored.unwrap_or(0),
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "offset lookup failed");
            0
        }
    };
    match std::fs::metadata(path) {
        Ok(metadata) if stored <= metadata.len() => stored,
        _ => 0,
    }
}

#[async_trait]
impl Input for FileInput {
    fn register(&mut self, kind: ExportKind, sink: Arc<dyn Sink>) {
        let registered = match kind {
            ExportKind::History => self.history.as_mut().map(|s| s.register(sink)),
            ExportKind::Trends => self.trends.as_mut().map(|s| s.register(sink)),
            ExportKind::Events => self.events.as_mut().map(|s| s.register(sink)),
        };
        if registered.is_none() {
            tracing::warn!(kind = %kind, "export kind not enabled upstream, sink not registered");
        }
    }

    async fn is_ready(&self) -> bool {
        self.gate.probe().await.active
    }

    async fn start(&mut self) -> Result<(), SourceError> {
        let offsets = OffsetStore::open(&self.data_dir)?;
        let cancel = CancellationToken::new();
        let mut tailers = Vec::new();
        let mut subjects = Vec::new();

        if let Some(subject) = self.history.take() {
            let files = export_files(&self.server, ExportKind::History);
            Self::start_kind(subject, files, &offsets, &cancel, &mut tailers, &mut subjects);
        }
        if let Some(subject) = self.trends.take() {
            let files = export_files(&self.server, ExportKind::Trends);
            Self::start_kind(subject, files, &offsets, &cancel, &mut tailers, &mut subjects);
        }
        if let Some(subject) = self.events.take() {
            let files = export_files(&self.server, ExportKind::Events);
            Self::start_kind(subject, files, &offsets, &cancel, &mut tailers, &mut subjects);
        }

        tracing::info!(
            files = tailers.len(),
            batch_size = self.batch_size,
            "file input started"
        );
        self.running = Some(Running {
            offsets,
            cancel,
            tailers,
            subjects,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Stop producing first; tailer tasks drop their channel senders as
        // they exit.
        running.cancel.cancel();
        let mut offsets_persisted = 0usize;
        for tailer in running.tailers {
            if let Err(err) = tailer.task.await {
                tracing::error!(file = %tailer.path.display(), error = %err, "tailer task panicked");
            }
            let offset = tailer.offset.load(Ordering::Relaxed);
            match running.offsets.set(&tailer.path, offset) {
                Ok(()) => offsets_persisted += 1,
                Err(err) => {
                    tracing::error!(file = %tailer.path.display(), error = %err, "failed to record offset");
                }
            }
        }
        if let Err(err) = running.offsets.flush() {
            tracing::error!(error = %err, "failed to flush offset store");
        }
        tracing::info!(offsets = offsets_persisted, "file offsets persisted");

        // Channels are closed now; give the subjects a bounded window to
        // drain and clean their sinks up.
        for task in running.subjects {
            if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
                tracing::warn!("subject did not drain within timeout");
            }
        }
    }
}
