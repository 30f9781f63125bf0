//! Per-sink offline buffer

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zship_protocol::Export;

use crate::BufferError;

/// Kind-tagged envelope stored under the record's key.
///
/// The `kind` tag lets one buffer hold several export kinds while fetch
/// hands back only the requested one; `expires_at` (unix seconds) carries
/// the TTL, enforced lazily on fetch.
#[derive(Deserialize)]
struct Stored<T> {
    kind: String,
    expires_at: u64,
    record: T,
}

/// Borrowing counterpart of [`Stored`] for the write path.
#[derive(Serialize)]
struct StoredRef<'a, T> {
    kind: &'a str,
    expires_at: u64,
    record: &'a T,
}

/// Keyed persistent queue for a single sink's undelivered records.
///
/// Opened under `<data_dir>/<sink_name>/` when the sink's offline TTL is
/// positive; a TTL of zero (or less) yields a disabled buffer whose
/// operations report [`BufferError::Disabled`].
pub struct OfflineBuffer {
    db: Option<sled::Db>,
    ttl: Duration,
}

impl OfflineBuffer {
    /// A buffer that stores nothing. Used for sinks with TTL <= 0.
    pub fn disabled() -> Self {
        Self {
            db: None,
            ttl: Duration::ZERO,
        }
    }

    /// Open (or create) the buffer store for `sink_name` under `data_dir`.
    pub fn open(data_dir: &Path, sink_name: &str, ttl_hours: i64) -> Result<Self, BufferError> {
        if ttl_hours <= 0 {
            return Ok(Self::disabled());
        }
        let path = data_dir.join(sink_name);
        let db = sled::open(&path)?;
        tracing::debug!(path = %path.display(), ttl_hours, "opened offline buffer");
        Ok(Self {
            db: Some(db),
            ttl: Duration::from_secs(ttl_hours as u64 * 3600),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Park a batch of records, keyed by `record.key()`, expiring after the
    /// configured TTL. The whole batch is applied atomically.
    pub fn put<T: Export>(&self, records: &[T]) -> Result<(), BufferError> {
        let deadline = unix_now() + self.ttl.as_secs();
        self.put_with_deadline(records, deadline)
    }

    fn put_with_deadline<T: Export>(&self, records: &[T], deadline: u64) -> Result<(), BufferError> {
        let db = self.db.as_ref().ok_or(BufferError::Disabled)?;
        let mut batch = sled::Batch::default();
        for record in records {
            let stored = StoredRef {
                kind: T::kind_name(),
                expires_at: deadline,
                record,
            };
            batch.insert(record.key(), serde_json::to_vec(&stored)?);
        }
        db.apply_batch(batch)?;
        db.flush()?;
        Ok(())
    }

    /// Fetch up to `n` records of kind `T`. Expired entries are deleted in
    /// passing; entries of other kinds and undecodable values are skipped.
    pub fn fetch<T: Export + DeserializeOwned>(&self, n: usize) -> Result<Vec<T>, BufferError> {
        let db = self.db.as_ref().ok_or(BufferError::Disabled)?;
        let now = unix_now();
        let mut out = Vec::with_capacity(n);

        for entry in db.iter() {
            let (key, value) = entry?;
            let stored: Stored<T> = match serde_json::from_slice(&value) {
                Ok(s) => s,
                Err(err) => {
                    tracing::error!(error = %err, "dropping undecodable buffer entry");
                    continue;
                }
            };
            if stored.expires_at <= now {
                db.remove(key)?;
                continue;
            }
            if stored.kind != T::kind_name() {
                continue;
            }
            out.push(stored.record);
            if out.len() >= n {
                break;
            }
        }
        Ok(out)
    }

    /// Remove a batch of records by key.
    pub fn delete<T: Export>(&self, records: &[T]) -> Result<(), BufferError> {
        let db = self.db.as_ref().ok_or(BufferError::Disabled)?;
        let mut batch = sled::Batch::default();
        for record in records {
            batch.remove(record.key());
        }
        db.apply_batch(batch)?;
        db.flush()?;
        Ok(())
    }

    /// Flush and release the store.
    pub fn close(&self) {
        if let Some(db) = &self.db {
            if let Err(err) = db.flush() {
                tracing::error!(error = %err, "failed to flush offline buffer on close");
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
#[path = "offline_test.rs"]
mod offline_test;
