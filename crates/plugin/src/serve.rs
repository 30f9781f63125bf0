//! Plugin-side runtime
//!
//! A plugin binary implements [`PluginHandler`] and hands it to [`serve`],
//! which owns the whole host-facing ceremony: cookie check, socket setup,
//! handshake line, request loop, teardown.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixListener;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use zship_protocol::{Event, History, Trend};

use crate::wire::{handshake_line, InitializeRequest, PluginInfo, Reply, ReplyFrame, Request, RequestFrame, COOKIE_KEY, COOKIE_VALUE};
use crate::PluginError;

/// Outcome of one plugin-side save.
#[derive(Debug, Default)]
pub struct SaveResult {
    pub processed: u64,
    pub failed: u64,
    pub error: Option<String>,
}

impl SaveResult {
    pub fn ok(processed: u64) -> Self {
        Self {
            processed,
            ..Self::default()
        }
    }

    pub fn failed(failed: u64, error: impl Into<String>) -> Self {
        Self {
            processed: 0,
            failed,
            error: Some(error.into()),
        }
    }
}

/// What a plugin implements. Kinds the plugin does not support should
/// simply return `SaveResult::ok(0)`.
#[async_trait]
pub trait PluginHandler: Send + Sync + 'static {
    /// Configure the plugin. Returning `Err` rejects the target; the host
    /// will tear this process down.
    async fn initialize(&self, request: InitializeRequest) -> Result<PluginInfo, String>;

    async fn save_history(&self, records: Vec<History>) -> SaveResult;
    async fn save_trends(&self, records: Vec<Trend>) -> SaveResult;
    async fn save_events(&self, records: Vec<Event>) -> SaveResult;

    /// Release resources before the process is killed.
    async fn cleanup(&self) {}
}

/// Run the plugin: handshake with the host on stdout, then serve requests
/// until `Cleanup` arrives or the host disconnects.
pub async fn serve<H: PluginHandler>(handler: H) -> Result<(), PluginError> {
    if std::env::var(COOKIE_KEY).as_deref() != Ok(COOKIE_VALUE) {
        return Err(PluginError::Handshake(
            "this binary is a shipper plugin and cannot be executed directly".to_string(),
        ));
    }

    let socket = std::env::temp_dir().join(format!("zship-plugin-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&socket);
    let listener = UnixListener::bind(&socket)?;

    // The handshake line must be the first thing on stdout.
    println!("{}", handshake_line(&socket));

    let (stream, _) = listener.accept().await?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = frame.map_err(|err| PluginError::Transport(err.to_string()))?;
        let RequestFrame { id, request } = serde_json::from_slice(&frame)?;

        let (reply, done) = match request {
            Request::Initialize(init) => match handler.initialize(init).await {
                Ok(info) => (
                    Reply::Initialized {
                        success: true,
                        error: None,
                        info: Some(info),
                    },
                    false,
                ),
                Err(error) => (
                    Reply::Initialized {
                        success: false,
                        error: Some(error),
                        info: None,
                    },
                    false,
                ),
            },
            Request::SaveHistory { records } => {
                (saved(handler.save_history(records).await), false)
            }
            Request::SaveTrends { records } => (saved(handler.save_trends(records).await), false),
            Request::SaveEvents { records } => (saved(handler.save_events(records).await), false),
            Request::Cleanup => {
                handler.cleanup().await;
                (
                    Reply::CleanedUp {
                        success: true,
                        error: None,
                    },
                    true,
                )
            }
        };

        let bytes = serde_json::to_vec(&ReplyFrame { id, reply })?;
        framed
            .send(bytes.into())
            .await
            .map_err(|err| PluginError::Transport(err.to_string()))?;
        if done {
            break;
        }
    }

    let _ = std::fs::remove_file(&socket);
    Ok(())
}

fn saved(result: SaveResult) -> Reply {
    Reply::Saved {
        success: result.error.is_none(),
        processed: result.processed,
        failed: result.failed,
        error: result.error,
    }
}
