use super::*;
use zship_protocol::{History, Trend};

fn history(itemid: i64, clock: i64) -> History {
    History {
        itemid,
        clock,
        ..History::default()
    }
}

fn open_buffer(dir: &Path) -> OfflineBuffer {
    OfflineBuffer::open(dir, "test-sink", 24).unwrap()
}

#[test]
fn zero_ttl_disables_buffering() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = OfflineBuffer::open(dir.path(), "s", 0).unwrap();
    assert!(!buffer.is_enabled());
    assert!(matches!(
        buffer.put(&[history(1, 1)]),
        Err(BufferError::Disabled)
    ));
    assert!(matches!(buffer.fetch::<History>(1), Err(BufferError::Disabled)));

    let negative = OfflineBuffer::open(dir.path(), "s", -3).unwrap();
    assert!(!negative.is_enabled());
}

#[test]
fn put_then_fetch_returns_same_set() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    let records = vec![history(1, 10), history(2, 10), history(3, 10)];
    buffer.put(&records).unwrap();

    let mut fetched = buffer.fetch::<History>(10).unwrap();
    fetched.sort_by_key(|h| h.itemid);
    assert_eq!(fetched, records);
}

#[test]
fn fetch_respects_requested_count() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    let records: Vec<History> = (0..5).map(|i| history(i, 10)).collect();
    buffer.put(&records).unwrap();
    assert_eq!(buffer.fetch::<History>(2).unwrap().len(), 2);
}

#[test]
fn delete_empties_the_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    let records = vec![history(1, 10), history(2, 10)];
    buffer.put(&records).unwrap();
    buffer.delete(&records).unwrap();
    assert!(buffer.fetch::<History>(10).unwrap().is_empty());
}

#[test]
fn put_overwrites_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    let mut record = history(1, 10);
    buffer.put(&[record.clone()]).unwrap();
    record.name = "updated".to_string();
    buffer.put(&[record.clone()]).unwrap();

    let fetched = buffer.fetch::<History>(10).unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].name, "updated");
}

#[test]
fn fetch_skips_other_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    let trend = Trend {
        itemid: 9,
        clock: 100,
        count: 1,
        ..Trend::default()
    };
    buffer.put(&[trend.clone()]).unwrap();
    buffer.put(&[history(1, 10)]).unwrap();

    assert_eq!(buffer.fetch::<History>(10).unwrap().len(), 1);
    assert_eq!(buffer.fetch::<Trend>(10).unwrap(), vec![trend]);
}

#[test]
fn expired_entries_are_dropped_and_purged() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = open_buffer(dir.path());
    // Deadline already in the past.
    buffer.put_with_deadline(&[history(1, 10)], 1).unwrap();
    buffer.put(&[history(2, 10)]).unwrap();

    let fetched = buffer.fetch::<History>(10).unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].itemid, 2);

    // The expired entry was deleted, not just skipped.
    let again = buffer.fetch::<History>(10).unwrap();
    assert_eq!(again.len(), 1);
}

#[test]
fn survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let buffer = open_buffer(dir.path());
        buffer.put(&[history(7, 70)]).unwrap();
        buffer.close();
    }
    let buffer = open_buffer(dir.path());
    let fetched = buffer.fetch::<History>(10).unwrap();
    assert_eq!(fetched[0].itemid, 7);
}
