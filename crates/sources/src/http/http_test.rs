use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::*;

/// The endpoint counters are process-global; run these tests one at a
/// time so the deltas they assert are their own.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn state() -> (Arc<HttpState>, mpsc::Receiver<History>, mpsc::Receiver<Event>) {
    let (history_tx, history_rx) = mpsc::channel(64);
    let (events_tx, events_rx) = mpsc::channel(64);
    (
        Arc::new(HttpState {
            history_tx,
            events_tx,
        }),
        history_rx,
        events_rx,
    )
}

fn history_line(itemid: i64) -> String {
    format!(r#"{{"itemid":{itemid},"clock":100,"ns":0,"value":2.5,"type":0}}"#)
}

fn event_line(eventid: i64) -> String {
    format!(r#"{{"clock":100,"ns":0,"value":1,"eventid":{eventid},"name":"p"}}"#)
}

async fn post(app: Router, uri: &str, encoding: Option<&str>, body: Vec<u8>) -> StatusCode {
    let mut request = Request::builder().method("POST").uri(uri);
    if let Some(encoding) = encoding {
        request = request.header("Content-Encoding", encoding);
    }
    let response = app
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn plain_history_lines_are_forwarded() {
    let _guard = serial();
    let (state, mut history_rx, _events_rx) = state();
    let app = http_app(state);

    let body = format!("{}\n{}\n", history_line(1), history_line(2));
    let status = post(app, "/history", None, body.into_bytes()).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(history_rx.recv().await.unwrap().itemid, 1);
    assert_eq!(history_rx.recv().await.unwrap().itemid, 2);
}

#[tokio::test]
async fn events_route_parses_event_records() {
    let _guard = serial();
    let (state, _history_rx, mut events_rx) = state();
    let app = http_app(state);

    let status = post(app, "/events", None, event_line(9).into_bytes()).await;
    assert_eq!(status, StatusCode::OK);

    let event = events_rx.recv().await.unwrap();
    assert_eq!(event.eventid, 9);
    assert!(event.is_problem());
}

#[tokio::test]
async fn gzip_body_with_one_bad_line_counts_three_lines_one_error() {
    let _guard = serial();
    let (state, mut history_rx, _events_rx) = state();
    let app = http_app(state);

    let lines_before = zship_metrics::ndjson_lines("history").get();
    let errors_before = zship_metrics::ndjson_parse_errors("history").get();

    let plain = format!("{}\nnot-json\n{}\n", history_line(1), history_line(2));
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(plain.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let status = post(app, "/history", Some("gzip"), compressed).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(zship_metrics::ndjson_lines("history").get(), lines_before + 3);
    assert_eq!(
        zship_metrics::ndjson_parse_errors("history").get(),
        errors_before + 1
    );

    // Exactly the two valid records came through.
    assert_eq!(history_rx.recv().await.unwrap().itemid, 1);
    assert_eq!(history_rx.recv().await.unwrap().itemid, 2);
    assert!(history_rx.try_recv().is_err());
}

#[tokio::test]
async fn zstd_body_is_accepted() {
    let _guard = serial();
    let (state, mut history_rx, _events_rx) = state();
    let app = http_app(state);

    let compressed = zstd::stream::encode_all(history_line(5).as_bytes(), 0).unwrap();
    let status = post(app, "/history", Some("zstd"), compressed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history_rx.recv().await.unwrap().itemid, 5);
}

#[tokio::test]
async fn deflate_body_is_accepted() {
    let _guard = serial();
    let (state, mut history_rx, _events_rx) = state();
    let app = http_app(state);

    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(history_line(6).as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let status = post(app, "/history", Some("deflate"), compressed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history_rx.recv().await.unwrap().itemid, 6);
}

#[tokio::test]
async fn unknown_encoding_is_refused_with_415() {
    let _guard = serial();
    let (state, _history_rx, _events_rx) = state();
    let app = http_app(state);

    let status = post(app, "/history", Some("br"), b"anything".to_vec()).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn corrupt_gzip_stream_is_a_400() {
    let _guard = serial();
    let (state, _history_rx, _events_rx) = state();
    let app = http_app(state);

    let status = post(app, "/history", Some("gzip"), b"definitely not gzip".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_method_is_a_405() {
    let _guard = serial();
    let (state, _history_rx, _events_rx) = state();
    let app = http_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/history")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn empty_lines_are_ignored() {
    let _guard = serial();
    let (state, mut history_rx, _events_rx) = state();
    let app = http_app(state);

    let before = zship_metrics::ndjson_lines("history").get();
    let body = format!("\n\n{}\n   \n", history_line(3));
    let status = post(app, "/history", None, body.into_bytes()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history_rx.recv().await.unwrap().itemid, 3);
    assert_eq!(zship_metrics::ndjson_lines("history").get(), before + 1);
}
