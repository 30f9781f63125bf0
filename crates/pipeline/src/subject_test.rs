use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use zship_filter::{FilterKind, FilterRule};
use zship_protocol::{Event, History, Tag, Trend};

use super::*;

/// Sink that records every batch it receives.
struct RecordingSink {
    name: String,
    history_batches: Mutex<Vec<Vec<History>>>,
    cleaned: Mutex<bool>,
}

impl RecordingSink {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            history_batches: Mutex::new(Vec::new()),
            cleaned: Mutex::new(false),
        })
    }

    fn batches(&self) -> Vec<Vec<History>> {
        self.history_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn save_history(&self, batch: Vec<History>) -> bool {
        self.history_batches.lock().unwrap().push(batch);
        true
    }

    async fn save_trends(&self, _batch: Vec<Trend>) -> bool {
        true
    }

    async fn save_events(&self, _batch: Vec<Event>) -> bool {
        true
    }

    async fn cleanup(&self) {
        *self.cleaned.lock().unwrap() = true;
    }
}

fn history(itemid: i64) -> History {
    History {
        itemid,
        clock: 100,
        ..History::default()
    }
}

fn tagged(itemid: i64, tag: &str, value: &str) -> History {
    History {
        itemid,
        clock: 100,
        tags: vec![Tag::new(tag, value)],
        ..History::default()
    }
}

/// Dispatched saves run as their own tasks; give them a moment to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn dispatches_full_batches_only() {
    let sink = RecordingSink::new("rec");
    let mut subject = Subject::<History>::new(2, Filter::Inert);
    subject.register(Arc::clone(&sink) as Arc<dyn Sink>);
    let handle = subject.start();

    // 5 records at batch size 2: exactly two full batches, one leftover.
    for i in 0..5 {
        handle.sender.send(history(i)).await.unwrap();
    }
    settle().await;

    // Save tasks may land in either order; sort before asserting content.
    let mut batches = sink.batches();
    batches.sort_by_key(|b| b[0].itemid);
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[0][0].itemid, 0);
    assert_eq!(batches[0][1].itemid, 1);
    assert_eq!(batches[1][0].itemid, 2);
    assert_eq!(batches[1][1].itemid, 3);

    drop(handle.sender);
    handle.task.await.unwrap();
}

#[tokio::test]
async fn remainder_is_flushed_on_close() {
    let sink = RecordingSink::new("rec");
    let mut subject = Subject::<History>::new(10, Filter::Inert);
    subject.register(Arc::clone(&sink) as Arc<dyn Sink>);
    let handle = subject.start();

    handle.sender.send(history(1)).await.unwrap();
    drop(handle.sender);
    handle.task.await.unwrap();
    settle().await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert!(*sink.cleaned.lock().unwrap());
}

#[tokio::test]
async fn global_filter_drops_records_before_batching() {
    let rule = FilterRule {
        kind: FilterKind::Tag,
        accepted: vec!["env:prod".into()],
        rejected: vec![],
    };
    let sink = RecordingSink::new("rec");
    let mut subject = Subject::<History>::new(1, Filter::from_rule(&rule).unwrap());
    subject.register(Arc::clone(&sink) as Arc<dyn Sink>);
    let handle = subject.start();

    handle.sender.send(tagged(1, "env", "dev")).await.unwrap();
    handle.sender.send(tagged(2, "env", "prod")).await.unwrap();
    settle().await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].itemid, 2);

    drop(handle.sender);
    handle.task.await.unwrap();
}

#[tokio::test]
async fn every_registered_sink_receives_each_batch() {
    let first = RecordingSink::new("first");
    let second = RecordingSink::new("second");
    let mut subject = Subject::<History>::new(1, Filter::Inert);
    subject.register(Arc::clone(&first) as Arc<dyn Sink>);
    subject.register(Arc::clone(&second) as Arc<dyn Sink>);
    assert_eq!(subject.sink_count(), 2);
    let handle = subject.start();

    handle.sender.send(history(7)).await.unwrap();
    settle().await;

    assert_eq!(first.batches().len(), 1);
    assert_eq!(second.batches().len(), 1);

    drop(handle.sender);
    handle.task.await.unwrap();
}

#[tokio::test]
async fn duplicate_sink_names_overwrite() {
    let first = RecordingSink::new("same");
    let second = RecordingSink::new("same");
    let mut subject = Subject::<History>::new(1, Filter::Inert);
    subject.register(Arc::clone(&first) as Arc<dyn Sink>);
    subject.register(Arc::clone(&second) as Arc<dyn Sink>);
    assert_eq!(subject.sink_count(), 1);
    let handle = subject.start();

    handle.sender.send(history(1)).await.unwrap();
    settle().await;

    assert!(first.batches().is_empty());
    assert_eq!(second.batches().len(), 1);

    drop(handle.sender);
    handle.task.await.unwrap();
}

#[tokio::test]
async fn batch_size_is_floored_to_one() {
    let sink = RecordingSink::new("rec");
    let mut subject = Subject::<History>::new(0, Filter::Inert);
    subject.register(Arc::clone(&sink) as Arc<dyn Sink>);
    let handle = subject.start();

    handle.sender.send(history(1)).await.unwrap();
    settle().await;
    assert_eq!(sink.batches().len(), 1);

    drop(handle.sender);
    handle.task.await.unwrap();
}
