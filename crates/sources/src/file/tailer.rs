//! Single-file tailer
//!
//! Follows one export file: reads complete lines from a starting offset,
//! parses each into a record and forwards it to the subject channel.
//! Rotation is detected at EOF by inode change or shrinkage below the read
//! position; either reopens the file from the start. Only whole lines
//! (newline-terminated) are consumed - the committed offset never points
//! into the middle of a line.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prometheus::IntCounter;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zship_protocol::Export;

/// How often the tailer looks for new data or a missing file.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const CHUNK: usize = 16 * 1024;

/// Handle to a running tailer: its file path and the offset to persist on
/// shutdown.
pub struct TailerHandle {
    pub path: PathBuf,
    pub offset: Arc<AtomicU64>,
    pub task: JoinHandle<()>,
}

/// Spawn a tailer for `path`, starting at `start_offset` (already
/// validated against the file size), sending parsed records of kind `T`.
pub fn spawn<T: Export>(
    path: PathBuf,
    file_index: usize,
    start_offset: u64,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
) -> TailerHandle {
    let offset = Arc::new(AtomicU64::new(start_offset));
    let tailer = Tailer {
        path: path.clone(),
        tx,
        committed: Arc::clone(&offset),
        cancel,
        parsed: zship_metrics::lines_parsed(file_index, T::kind_name()),
        invalid: zship_metrics::lines_invalid(file_index, T::kind_name()),
    };
    let task = tokio::spawn(tailer.run(start_offset));
    TailerHandle { path, offset, task }
}

struct OpenFile {
    file: File,
    inode: u64,
    /// Bytes consumed from the file into the line buffer.
    position: u64,
}

enum Drain {
    /// Caught up; poll again later.
    Idle,
    /// File rotated or unreadable; reopen from scratch.
    Reopen,
    /// Shutdown or closed channel.
    Stop,
}

struct Tailer<T> {
    path: PathBuf,
    tx: mpsc::Sender<T>,
    committed: Arc<AtomicU64>,
    cancel: CancellationToken,
    parsed: IntCounter,
    invalid: IntCounter,
}

impl<T: Export> Tailer<T> {
    async fn run(self, start_offset: u64) {
        let mut current: Option<OpenFile> = None;
        let mut pending: Vec<u8> = Vec::new();
        let mut first_open = true;
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        tracing::info!(file = %self.path.display(), offset = start_offset, "tailing export file");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if current.is_none() {
                // On the very first open resume from the persisted offset;
                // after a rotation start from the beginning.
                let resume = if first_open { start_offset } else { 0 };
                match open_at(&self.path, resume).await {
                    Some(open) => {
                        first_open = false;
                        pending.clear();
                        self.committed.store(open.position, Ordering::Relaxed);
                        current = Some(open);
                    }
                    None => continue,
                }
            }

            let open = current.as_mut().expect("file opened above");
            match self.drain(open, &mut pending).await {
                Drain::Idle => {}
                Drain::Reopen => current = None,
                Drain::Stop => return,
            }
        }
    }

    /// Read and forward everything currently available in the file.
    async fn drain(&self, open: &mut OpenFile, pending: &mut Vec<u8>) -> Drain {
        let mut chunk = [0u8; CHUNK];
        loop {
            let read = match open.file.read(&mut chunk).await {
                Ok(read) => read,
                Err(err) => {
                    tracing::error!(file = %self.path.display(), error = %err, "read failed, reopening");
                    return Drain::Reopen;
                }
            };
            if read == 0 {
                if rotated(&self.path, open).await {
                    tracing::info!(file = %self.path.display(), "export file rotated, reopening");
                    return Drain::Reopen;
                }
                return Drain::Idle;
            }

            open.position += read as u64;
            pending.extend_from_slice(&chunk[..read]);

            // Emit every complete line; keep the trailing partial.
            while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                let consumed = open.position - pending.len() as u64;
                if let Drain::Stop = self.emit(&line, consumed).await {
                    return Drain::Stop;
                }
            }
        }
    }

    /// Parse one line and send it on; advances the committed offset past
    /// the line whether it parsed or not.
    async fn emit(&self, line: &[u8], consumed: u64) -> Drain {
        let trimmed = trim_line(line);
        if trimmed.is_empty() {
            self.committed.store(consumed, Ordering::Relaxed);
            return Drain::Idle;
        }

        match serde_json::from_slice::<T>(trimmed) {
            Ok(record) => {
                self.parsed.inc();
                let stop = tokio::select! {
                    sent = self.tx.send(record) => sent.is_err(),
                    _ = self.cancel.cancelled() => true,
                };
                self.committed.store(consumed, Ordering::Relaxed);
                if stop {
                    return Drain::Stop;
                }
            }
            Err(err) => {
                self.invalid.inc();
                self.committed.store(consumed, Ordering::Relaxed);
                tracing::error!(
                    file = %self.path.display(),
                    error = %err,
                    "failed to parse export line"
                );
            }
        }
        Drain::Idle
    }
}

/// Open `path` and seek to `offset`; `None` when the file is not there yet.
async fn open_at(path: &Path, offset: u64) -> Option<OpenFile> {
    let mut file = File::open(path).await.ok()?;
    let metadata = file.metadata().await.ok()?;
    let inode = inode_of(&metadata);

    let offset = if offset > metadata.len() { 0 } else { offset };
    file.seek(SeekFrom::Start(offset)).await.ok()?;

    Some(OpenFile {
        file,
        inode,
        position: offset,
    })
}

/// At EOF: has the file been replaced or truncated under us?
async fn rotated(path: &Path, open: &OpenFile) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => inode_of(&metadata) != open.inode || metadata.len() < open.position,
        // Gone entirely; reopen once it reappears.
        Err(_) => true,
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> u64 {
    0
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let Some((&last, rest)) = line.split_last() {
        if matches!(last, b'\n' | b'\r' | b' ' | b'\t') {
            line = rest;
        } else {
            break;
        }
    }
    while let Some((&first, rest)) = line.split_first() {
        if matches!(first, b' ' | b'\t') {
            line = rest;
        } else {
            break;
        }
    }
    line
}

#[cfg(test)]
#[path = "tailer_test.rs"]
mod tailer_test;
