//! Plugin-backed sink
//!
//! Adapts a [`PluginClient`] to the in-process sink contract. The host
//! keeps the offline buffer and local filter on its side of the channel,
//! so a plugin crash loses nothing that a misbehaving in-process sink
//! would not also lose.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zship_filter::FilterRule;
use zship_protocol::{Event, ExportKind, History, Trend};
use zship_sinks::{Sink, SinkCore, SinkError, WriteOutcome};

use crate::wire::InitializeRequest;
use crate::{DiscoveredPlugin, PluginClient, PluginError, Reply, Request};

pub struct PluginSink {
    core: SinkCore,
    client: Mutex<Option<PluginClient>>,
}

impl PluginSink {
    /// Launch the plugin process and run the `Initialize` exchange. Any
    /// failure tears the child down again; the target is then skipped.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize(
        core: SinkCore,
        plugin: &DiscoveredPlugin,
        connection: &str,
        options: &HashMap<String, String>,
        kinds: &[ExportKind],
        filter: FilterRule,
    ) -> Result<Self, PluginError> {
        let mut client = PluginClient::launch(plugin).await?;

        let request = Request::Initialize(InitializeRequest {
            name: core.name().to_string(),
            connection: connection.to_string(),
            options: options.clone(),
            kinds: kinds.to_vec(),
            filter,
        });

        match client.call(request).await {
            Ok(Reply::Initialized {
                success: true,
                info,
                ..
            }) => {
                let info = info.unwrap_or_default();
                tracing::info!(
                    plugin = %plugin.name,
                    version = %info.version,
                    author = %info.author,
                    "plugin initialized"
                );
                zship_metrics::plugin_info(
                    &plugin.name,
                    if info.version.is_empty() {
                        "unknown"
                    } else {
                        &info.version
                    },
                );
                Ok(Self {
                    core,
                    client: Mutex::new(Some(client)),
                })
            }
            Ok(Reply::Initialized { error, .. }) => {
                client.shutdown().await;
                Err(PluginError::Rpc(
                    error.unwrap_or_else(|| "initialization rejected".to_string()),
                ))
            }
            Ok(_) => {
                client.shutdown().await;
                Err(PluginError::Transport(
                    "unexpected reply to Initialize".to_string(),
                ))
            }
            Err(err) => {
                client.shutdown().await;
                Err(err)
            }
        }
    }

    /// Translate a save reply into a write outcome. Transport failures and
    /// malformed replies fail the whole batch, which parks it in the
    /// offline buffer when one is configured.
    async fn write_batch<T: Clone>(
        &self,
        kind: ExportKind,
        batch: Vec<T>,
        request: Request,
    ) -> WriteOutcome<T> {
        let mut guard = self.client.lock().await;
        let Some(client) = guard.as_mut() else {
            return WriteOutcome::failed(batch, SinkError::write("plugin already shut down"));
        };

        match client.call(request).await {
            Ok(Reply::Saved {
                success,
                processed,
                failed,
                error,
            }) => {
                self.core.record_sent(kind, processed);
                self.core.record_failed(kind, failed);
                if success {
                    WriteOutcome::ok()
                } else {
                    WriteOutcome::failed(
                        batch,
                        SinkError::write(error.unwrap_or_else(|| "plugin save failed".to_string())),
                    )
                }
            }
            Ok(_) => {
                self.core.record_failed(kind, batch.len() as u64);
                WriteOutcome::failed(batch, SinkError::write("unexpected reply to save call"))
            }
            Err(err) => {
                self.core.record_failed(kind, batch.len() as u64);
                WriteOutcome::failed(batch, SinkError::write(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl Sink for PluginSink {
    fn name(&self) -> &str {
        self.core.name()
    }

    async fn save_history(&self, batch: Vec<History>) -> bool {
        self.core
            .save_with_retry(batch, |b| {
                let request = Request::SaveHistory { records: b.clone() };
                self.write_batch(ExportKind::History, b, request)
            })
            .await
    }

    async fn save_trends(&self, batch: Vec<Trend>) -> bool {
        self.core
            .save_with_retry(batch, |b| {
                let request = Request::SaveTrends { records: b.clone() };
                self.write_batch(ExportKind::Trends, b, request)
            })
            .await
    }

    async fn save_events(&self, batch: Vec<Event>) -> bool {
        self.core
            .save_with_retry(batch, |b| {
                let request = Request::SaveEvents { records: b.clone() };
                self.write_batch(ExportKind::Events, b, request)
            })
            .await
    }

    async fn cleanup(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.shutdown().await;
        }
        self.core.close();
    }
}
