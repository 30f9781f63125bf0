//! File offset index

use std::path::Path;

use crate::BufferError;

/// Maps absolute export file paths to the byte offset the tailer had
/// consumed up to. One store (`index.db`) is shared by all tailed files.
///
/// Values are 8-byte big-endian integers so the index can be inspected with
/// stock tooling.
pub struct OffsetStore {
    db: sled::Db,
}

impl OffsetStore {
    /// Open (or create) `index.db` under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, BufferError> {
        let path = data_dir.join("index.db");
        let db = sled::open(&path)?;
        tracing::debug!(path = %path.display(), "opened offset store");
        Ok(Self { db })
    }

    /// Last recorded offset for `file`, if any.
    pub fn get(&self, file: &Path) -> Result<Option<u64>, BufferError> {
        let key = file.to_string_lossy();
        match self.db.get(key.as_bytes())? {
            Some(value) if value.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&value);
                Ok(Some(u64::from_be_bytes(buf)))
            }
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    /// Record the offset for `file`.
    pub fn set(&self, file: &Path, offset: u64) -> Result<(), BufferError> {
        let key = file.to_string_lossy();
        self.db.insert(key.as_bytes(), offset.to_be_bytes().to_vec())?;
        Ok(())
    }

    /// Flush all recorded offsets to disk.
    pub fn flush(&self) -> Result<(), BufferError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn get_of_unknown_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&PathBuf::from("/nope")).unwrap(), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::open(dir.path()).unwrap();
        let file = PathBuf::from("/var/log/export/history-main-process-0.ndjson");
        store.set(&file, 8192).unwrap();
        assert_eq!(store.get(&file).unwrap(), Some(8192));
    }

    #[test]
    fn offsets_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = PathBuf::from("/exports/a.ndjson");
        {
            let store = OffsetStore::open(dir.path()).unwrap();
            store.set(&file, 42).unwrap();
            store.flush().unwrap();
        }
        let store = OffsetStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&file).unwrap(), Some(42));
    }
}
