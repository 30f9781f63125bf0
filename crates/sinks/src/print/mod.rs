//! Print sink - one line per record to stdout or stderr
//!
//! Debug/audit destination. The connection string selects the stream
//! (`stdout` or `stderr`); anything else falls back to stdout.

use std::io::Write;

use async_trait::async_trait;
use zship_protocol::{Event, Export, ExportKind, History, Trend};

use crate::{Sink, SinkCore, SinkError, WriteOutcome};

/// Output stream selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintTarget {
    Stdout,
    Stderr,
}

impl PrintTarget {
    /// `stderr` selects stderr; everything else (including the default
    /// empty connection) prints to stdout.
    pub fn from_connection(connection: &str) -> Self {
        if connection == "stderr" {
            PrintTarget::Stderr
        } else {
            PrintTarget::Stdout
        }
    }
}

/// Formats each record as a single human-readable line.
pub struct PrintSink {
    core: SinkCore,
    target: PrintTarget,
}

impl PrintSink {
    pub fn new(core: SinkCore, connection: &str) -> Self {
        Self {
            core,
            target: PrintTarget::from_connection(connection),
        }
    }

    fn write_lines<T, F>(&self, kind: ExportKind, batch: Vec<T>, format: F) -> WriteOutcome<T>
    where
        T: Export,
        F: Fn(&T) -> String,
    {
        let mut failed = Vec::new();
        let mut error = None;

        let mut emit = |line: &str| -> std::io::Result<()> {
            match self.target {
                PrintTarget::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
                PrintTarget::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
            }
        };

        for record in batch {
            self.core.record_sent(kind, 1);
            if let Err(err) = emit(&format(&record)) {
                self.core.record_failed(kind, 1);
                failed.push(record);
                error = Some(SinkError::Io(err));
            }
        }

        WriteOutcome { failed, error }
    }

    fn format_history(h: &History) -> String {
        format!(
            "Host: {}; Item: {}; Time: {}; Value: {}",
            h.host.host, h.name, h.clock, h.value
        )
    }

    fn format_trend(t: &Trend) -> String {
        format!(
            "Host: {}; Item: {}; Time: {}; Min/Max/Avg: {}/{}/{}",
            t.host.host, t.name, t.clock, t.min, t.max, t.avg
        )
    }

    fn format_event(e: &Event) -> String {
        let state = if e.is_problem() { "PROBLEM" } else { "OK" };
        format!(
            "Time: {}; Event: {}; State: {}; Severity: {}; Problem: {}",
            e.clock, e.eventid, state, e.severity, e.name
        )
    }
}

#[async_trait]
impl Sink for PrintSink {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn save_history(&self, batch: Vec<History>) -> bool {
        self.core
            .save_with_retry(batch, |b| async move {
                self.write_lines(ExportKind::History, b, Self::format_history)
            })
            .await
    }

    async fn save_trends(&self, batch: Vec<Trend>) -> bool {
        self.core
            .save_with_retry(batch, |b| async move {
                self.write_lines(ExportKind::Trends, b, Self::format_trend)
            })
            .await
    }

    async fn save_events(&self, batch: Vec<Event>) -> bool {
        self.core
            .save_with_retry(batch, |b| async move {
                self.write_lines(ExportKind::Events, b, Self::format_event)
            })
            .await
    }

    async fn cleanup(&self) {
        self.core.close();
    }
}
