use std::time::Duration;

use tokio::time::timeout;
use zship_protocol::History;

use super::*;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn line(itemid: i64) -> String {
    format!(r#"{{"itemid":{itemid},"clock":100,"ns":0,"value":1.5,"type":0}}"#)
}

async fn recv(rx: &mut mpsc::Receiver<History>) -> History {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for record")
        .expect("channel closed")
}

#[tokio::test]
async fn reads_complete_lines_from_the_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    std::fs::write(&path, format!("{}\n{}\n", line(1), line(2))).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path, 0, 0, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 1);
    assert_eq!(recv(&mut rx).await.itemid, 2);

    cancel.cancel();
    handle.task.await.unwrap();
}

#[tokio::test]
async fn resumes_from_persisted_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    let first = format!("{}\n", line(1));
    let contents = format!("{}{}\n", first, line(2));
    std::fs::write(&path, &contents).unwrap();

    // Offset pointing at the start of the second line.
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path, 0, first.len() as u64, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 2);

    cancel.cancel();
    handle.task.await.unwrap();
    // Offset advanced to the end of the file.
    assert_eq!(handle.offset.load(Ordering::Relaxed), contents.len() as u64);
}

#[tokio::test]
async fn offset_beyond_file_size_restarts_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    std::fs::write(&path, format!("{}\n", line(7))).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path, 0, 1_000_000, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 7);

    cancel.cancel();
    handle.task.await.unwrap();
}

#[tokio::test]
async fn picks_up_appended_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    std::fs::write(&path, format!("{}\n", line(1))).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path.clone(), 0, 0, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 1);

    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", line(2)).unwrap();
    }

    assert_eq!(recv(&mut rx).await.itemid, 2);

    cancel.cancel();
    handle.task.await.unwrap();
}

#[tokio::test]
async fn truncation_reopens_from_the_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    std::fs::write(&path, format!("{}\n{}\n", line(1), line(2))).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path.clone(), 0, 0, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 1);
    assert_eq!(recv(&mut rx).await.itemid, 2);

    // Rotation: the file is replaced by a shorter one.
    std::fs::write(&path, format!("{}\n", line(3))).unwrap();

    assert_eq!(recv(&mut rx).await.itemid, 3);

    cancel.cancel();
    handle.task.await.unwrap();
}

#[tokio::test]
async fn invalid_lines_are_counted_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    std::fs::write(
        &path,
        format!("{}\nnot json at all\n{}\n", line(1), line(2)),
    )
    .unwrap();

    let before_invalid = zship_metrics::lines_invalid(42, "history").get();
    let before_parsed = zship_metrics::lines_parsed(42, "history").get();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path, 42, 0, tx, cancel.clone());

    assert_eq!(recv(&mut rx).await.itemid, 1);
    assert_eq!(recv(&mut rx).await.itemid, 2);

    assert_eq!(zship_metrics::lines_invalid(42, "history").get(), before_invalid + 1);
    assert_eq!(zship_metrics::lines_parsed(42, "history").get(), before_parsed + 2);

    cancel.cancel();
    handle.task.await.unwrap();
}

#[tokio::test]
async fn partial_lines_are_not_emitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history-main-process-0.ndjson");
    // No trailing newline: the line is incomplete.
    std::fs::write(&path, line(1)).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = spawn::<History>(path.clone(), 0, 0, tx, cancel.clone());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(rx.try_recv().is_err());
    // Nothing consumed: the offset still points at the line start.
    assert_eq!(handle.offset.load(Ordering::Relaxed), 0);

    // Completing the line releases it.
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"\n").unwrap();
    }
    assert_eq!(recv(&mut rx).await.itemid, 1);

    cancel.cancel();
    handle.task.await.unwrap();
}
