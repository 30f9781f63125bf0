//! Route handlers and body decompression

use std::io::Read;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use zship_protocol::{Event, Export, History};

use super::HttpState;

pub(super) async fn handle_history(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    ingest::<History>(&headers, &body, &state.history_tx).await
}

pub(super) async fn handle_events(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    ingest::<Event>(&headers, &body, &state.events_tx).await
}

/// Decompress, split into lines, parse, forward. Per-line failures only
/// count; the request fails solely on transport or decompression errors.
async fn ingest<T: Export + DeserializeOwned>(
    headers: &HeaderMap,
    body: &[u8],
    tx: &mpsc::Sender<T>,
) -> StatusCode {
    let endpoint = T::kind_name();

    let body = match decompress(headers, body) {
        Ok(body) => body,
        Err(status) => return status,
    };

    let lines = zship_metrics::ndjson_lines(endpoint);
    let parse_errors = zship_metrics::ndjson_parse_errors(endpoint);

    for line in body.split(|&b| b == b'\n') {
        let line = trim(line);
        if line.is_empty() {
            continue;
        }
        lines.inc();

        match serde_json::from_slice::<T>(line) {
            Ok(record) => {
                if tx.send(record).await.is_err() {
                    tracing::error!(endpoint, "subject channel closed");
                    return StatusCode::SERVICE_UNAVAILABLE;
                }
            }
            Err(err) => {
                parse_errors.inc();
                tracing::error!(endpoint, error = %err, "failed to parse NDJSON line");
            }
        }
    }

    StatusCode::OK
}

/// Apply the request's `Content-Encoding`. Unknown encodings are refused
/// with 415; a stream that fails to decode is a 400.
fn decompress(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match encoding.as_str() {
        "" | "identity" => Ok(body.to_vec()),
        "gzip" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|err| {
                    tracing::error!(error = %err, "bad gzip request body");
                    StatusCode::BAD_REQUEST
                })?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|err| {
                    tracing::error!(error = %err, "bad deflate request body");
                    StatusCode::BAD_REQUEST
                })?;
            Ok(out)
        }
        "zstd" => zstd::stream::decode_all(body).map_err(|err| {
            tracing::error!(error = %err, "bad zstd request body");
            StatusCode::BAD_REQUEST
        }),
        other => {
            tracing::error!(encoding = other, "unsupported Content-Encoding");
            Err(StatusCode::UNSUPPORTED_MEDIA_TYPE)
        }
    }
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &line[start..end]
}
