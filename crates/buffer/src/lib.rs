//! Persistent keyed stores
//!
//! Two small stores back the at-least-once guarantees of the pipeline:
//!
//! - [`OfflineBuffer`] - one per sink (when the sink's offline TTL is
//!   positive). Failed batches are parked here under each record's stable
//!   key and replayed on the next successful write. Entries expire after
//!   the configured TTL so the buffer cannot grow without bound during a
//!   long outage.
//! - [`OffsetStore`] - the file-tail index (`index.db`): absolute file path
//!   to last-read byte offset, written on shutdown and consulted on start.
//!
//! Values are kind-tagged JSON envelopes, so a buffer shared by several
//! export kinds can hand each caller only the records of the kind it asked
//! for; anything undecodable is logged and skipped.

mod offline;
mod offset;

pub use offline::OfflineBuffer;
pub use offset::OffsetStore;

use thiserror::Error;

/// Errors from the persistent stores.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Operation on a buffer whose TTL disabled it.
    #[error("offline buffering is disabled for this sink")]
    Disabled,

    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
