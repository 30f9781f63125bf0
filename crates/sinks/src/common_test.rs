use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::*;
use zship_filter::{FilterKind, FilterRule};
use zship_protocol::{History, Tag};

fn history(itemid: i64) -> History {
    History {
        itemid,
        clock: 100,
        ..History::default()
    }
}

fn core_with_buffer(dir: &std::path::Path) -> SinkCore {
    SinkCore::new(
        "t",
        "test",
        Filter::Inert,
        OfflineBuffer::open(dir, "t", 24).unwrap(),
        &[ExportKind::History],
    )
}

/// Write function that fails a fixed number of times, then succeeds,
/// recording every batch it accepts.
struct FlakyWriter {
    failures_left: AtomicUsize,
    delivered: Mutex<Vec<History>>,
}

impl FlakyWriter {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            delivered: Mutex::new(Vec::new()),
        })
    }

    async fn write(&self, batch: Vec<History>) -> WriteOutcome<History> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return WriteOutcome::failed(batch, SinkError::write("downstream unavailable"));
        }
        self.delivered.lock().unwrap().extend(batch);
        WriteOutcome::ok()
    }
}

#[tokio::test]
async fn local_filter_is_applied_before_write() {
    let rule = FilterRule {
        kind: FilterKind::Tag,
        accepted: vec!["env:prod".into()],
        rejected: vec![],
    };
    let core = SinkCore::new(
        "t",
        "test",
        Filter::from_rule(&rule).unwrap(),
        OfflineBuffer::disabled(),
        &[ExportKind::History],
    );

    let writer = FlakyWriter::new(0);
    let mut prod = history(1);
    prod.tags = vec![Tag::new("env", "prod")];
    let dev = history(2);

    let w = Arc::clone(&writer);
    assert!(
        core.save_with_retry(vec![prod, dev], |b| {
            let w = Arc::clone(&w);
            async move { w.write(b).await }
        })
        .await
    );

    let delivered = writer.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].itemid, 1);
}

#[tokio::test]
async fn failed_writes_drain_through_the_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let core = core_with_buffer(dir.path());

    // Two failures, then permanent success: batches 1 and 2 are parked,
    // batch 3 succeeds and replays what was parked.
    let writer = FlakyWriter::new(2);

    for i in 0..3 {
        let w = Arc::clone(&writer);
        core.save_with_retry(vec![history(i)], |b| {
            let w = Arc::clone(&w);
            async move { w.write(b).await }
        })
        .await;
    }
    // One more round to replay whatever is still parked.
    let w = Arc::clone(&writer);
    core.save_with_retry(vec![history(3)], |b| {
        let w = Arc::clone(&w);
        async move { w.write(b).await }
    })
    .await;

    let delivered: Vec<i64> = writer
        .delivered
        .lock()
        .unwrap()
        .iter()
        .map(|h| h.itemid)
        .collect();
    // All records were eventually delivered...
    for i in 0..4 {
        assert!(delivered.contains(&i), "record {i} was never delivered");
    }
    // ...and the buffer is empty.
    assert!(core.buffer().fetch::<History>(16).unwrap().is_empty());
}

#[tokio::test]
async fn successful_retry_deletes_all_fetched_records() {
    let dir = tempfile::tempdir().unwrap();
    let core = core_with_buffer(dir.path());
    core.buffer().put(&[history(10), history(11)]).unwrap();

    let writer = FlakyWriter::new(0);
    let w = Arc::clone(&writer);
    core.save_with_retry(vec![history(12)], |b| {
        let w = Arc::clone(&w);
        async move { w.write(b).await }
    })
    .await;

    // Fetch asked for at least the batch size; with batch size 1 only one
    // buffered record is replayed per call, the other stays parked.
    let remaining = core.buffer().fetch::<History>(16).unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn disabled_buffer_skips_replay_entirely() {
    let core = SinkCore::new(
        "t",
        "test",
        Filter::Inert,
        OfflineBuffer::disabled(),
        &[ExportKind::History],
    );
    let writer = FlakyWriter::new(1);
    let w = Arc::clone(&writer);
    // The failed write is simply dropped: nothing to park it in.
    assert!(
        core.save_with_retry(vec![history(1)], |b| {
            let w = Arc::clone(&w);
            async move { w.write(b).await }
        })
        .await
    );
}

#[test]
fn counters_only_exist_for_enabled_kinds() {
    let core = SinkCore::new(
        "counted",
        "test",
        Filter::Inert,
        OfflineBuffer::disabled(),
        &[ExportKind::Events],
    );
    core.record_sent(ExportKind::Events, 2);
    // Disabled kind: silently ignored.
    core.record_sent(ExportKind::History, 5);
    assert_eq!(
        zship_metrics::shipping_operations("counted", "test", "events").get(),
        2
    );
    assert_eq!(
        zship_metrics::shipping_operations("counted", "test", "history").get(),
        0
    );
}
