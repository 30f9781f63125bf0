//! Prometheus exposition endpoint

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::REGISTRY;

#[derive(Debug, Error)]
pub enum MetricsServerError {
    #[error("failed to bind metrics endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Render the registry in the text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buf) {
        tracing::error!(error = %err, "failed to encode metrics");
    }
    String::from_utf8(buf).unwrap_or_default()
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        render(),
    )
}

/// The `GET /metrics` route, for merging into another server's router.
pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve `GET /metrics` on `addr` until cancelled.
pub async fn serve(addr: SocketAddr, cancel: CancellationToken) -> Result<(), MetricsServerError> {
    let app = router();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| MetricsServerError::Bind { addr, source })?;

    tracing::info!(%addr, "metrics endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
