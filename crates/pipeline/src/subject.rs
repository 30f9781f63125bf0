//! The per-kind fan-out subject

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::Gauge;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zship_filter::Filter;
use zship_sinks::{Sink, SinkDispatch};

/// The configured-size / live-usage gauge pair for one subject.
struct BatchGauges {
    size: Gauge,
    usage: Gauge,
}

impl BatchGauges {
    fn new(export_type: &str, batch_size: usize) -> Self {
        let gauges = Self {
            size: zship_metrics::buffer_size(export_type),
            usage: zship_metrics::buffer_usage(export_type),
        };
        gauges.size.set(batch_size as f64);
        gauges.usage.set(0.0);
        gauges
    }
}

/// Handle returned by [`Subject::start`]: the input side of the channel
/// plus the consumer task. Dropping every sender closes the subject; the
/// task drains, flushes and cleans up its sinks.
pub struct SubjectHandle<T> {
    pub sender: mpsc::Sender<T>,
    pub task: JoinHandle<()>,
}

/// Fan-out point for one export kind.
///
/// Sinks are keyed by name - registering a second sink under an existing
/// name replaces the first. Registration happens before ingestion starts.
pub struct Subject<T: SinkDispatch> {
    sinks: HashMap<String, Arc<dyn Sink>>,
    pending: Vec<T>,
    batch_size: usize,
    filter: Filter,
    gauges: BatchGauges,
}

impl<T: SinkDispatch> Subject<T> {
    /// Create a subject with the configured target batch size (floored to
    /// 1) and the global filter.
    pub fn new(batch_size: usize, filter: Filter) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sinks: HashMap::new(),
            pending: Vec::with_capacity(batch_size),
            batch_size,
            filter,
            gauges: BatchGauges::new(T::KIND.as_str(), batch_size),
        }
    }

    /// Register a sink under its name.
    pub fn register(&mut self, sink: Arc<dyn Sink>) {
        tracing::debug!(
            kind = %T::KIND,
            sink = sink.name(),
            "registered sink with subject"
        );
        self.sinks.insert(sink.name().to_string(), sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Spawn the consumer loop. The channel capacity is twice the batch
    /// size, which is where input backpressure comes from.
    pub fn start(self) -> SubjectHandle<T> {
        let (sender, receiver) = mpsc::channel(self.batch_size * 2);
        let task = tokio::spawn(self.run(receiver));
        SubjectHandle { sender, task }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<T>) {
        tracing::info!(
            kind = %T::KIND,
            batch_size = self.batch_size,
            sinks = self.sinks.len(),
            "subject starting"
        );

        while let Some(record) = receiver.recv().await {
            if !self.filter.accept(&record) {
                continue;
            }
            self.pending.push(record);
            self.gauges.usage.set(self.pending.len() as f64);

            if self.pending.len() >= self.batch_size {
                self.notify_all();
            }
        }

        // Channel closed: flush the remainder, then let the sinks go.
        if !self.pending.is_empty() {
            self.notify_all();
        }
        for sink in self.sinks.values() {
            sink.cleanup().await;
        }
        tracing::info!(kind = %T::KIND, "subject shut down");
    }

    /// Hand the pending batch to every sink, each in its own task, and
    /// reset. The dispatches are not awaited; failures are the sink's
    /// problem (counters and offline buffer).
    fn notify_all(&mut self) {
        let batch = std::mem::take(&mut self.pending);
        self.gauges.usage.set(0.0);

        for sink in self.sinks.values() {
            T::dispatch(Arc::clone(sink), batch.clone());
        }
    }
}

#[cfg(test)]
#[path = "subject_test.rs"]
mod subject_test;
