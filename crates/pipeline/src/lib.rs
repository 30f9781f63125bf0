//! Fan-out pipeline
//!
//! One [`Subject`] per enabled export kind sits between the input and the
//! registered sinks: it consumes records from a bounded channel, applies
//! the global filter, accumulates a batch, and on reaching the target
//! batch size fires every sink's save call as its own task - deliberately
//! not awaited, so a slow sink can never stall ingestion. Backpressure is
//! carried by the input channel's bounded capacity and each sink's offline
//! buffer, never by blocking dispatch.

mod subject;

pub use subject::{Subject, SubjectHandle};
