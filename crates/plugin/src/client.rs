//! Host-side RPC client for one plugin process

use std::process::Stdio;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::wire::{parse_handshake, ReplyFrame, RequestFrame, COOKIE_KEY, COOKIE_VALUE};
use crate::{DiscoveredPlugin, PluginError, Reply, Request, PROTOCOL_VERSION};

/// How long a plugin gets to print its handshake line.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the final cleanup RPC before the child is killed. Keeps a
/// blocked plugin from wedging shutdown.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected plugin process: the child handle plus the framed RPC
/// channel to it.
#[derive(Debug)]
pub struct PluginClient {
    name: String,
    child: Child,
    framed: Framed<UnixStream, LengthDelimitedCodec>,
    next_id: u64,
}

impl PluginClient {
    /// Launch the plugin executable, complete the handshake and connect.
    ///
    /// The child is started with the magic cookie in its environment and
    /// must answer with `<version>|<socket>` on stdout within the
    /// handshake deadline. A version mismatch kills the child and fails
    /// the launch; the caller skips this plugin and continues with others.
    pub async fn launch(plugin: &DiscoveredPlugin) -> Result<Self, PluginError> {
        let mut child = Command::new(&plugin.path)
            .env(COOKIE_KEY, COOKIE_VALUE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Handshake("child stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let line = timeout(HANDSHAKE_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| PluginError::Handshake("handshake timed out".to_string()))??
            .ok_or_else(|| PluginError::Handshake("child exited before handshake".to_string()))?;

        let (version, socket) = parse_handshake(&line)?;
        if version != PROTOCOL_VERSION {
            let _ = child.start_kill();
            return Err(PluginError::VersionMismatch { found: version });
        }

        // Keep draining stdout so the child never blocks on a full pipe;
        // whatever it prints becomes debug logging.
        let plugin_name = plugin.name.clone();
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(plugin = %plugin_name, output = %line, "plugin stdout");
            }
        });

        let stream = UnixStream::connect(&socket).await?;
        tracing::info!(plugin = %plugin.name, socket = %socket.display(), "plugin connected");

        Ok(Self {
            name: plugin.name.clone(),
            child,
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            next_id: 1,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Issue one call and wait for its reply. A closed channel (child
    /// crash included) surfaces as a transport error.
    pub async fn call(&mut self, request: Request) -> Result<Reply, PluginError> {
        let id = self.next_id;
        self.next_id += 1;

        let frame = serde_json::to_vec(&RequestFrame { id, request })?;
        self.framed
            .send(frame.into())
            .await
            .map_err(|err| PluginError::Transport(err.to_string()))?;

        loop {
            let frame = self
                .framed
                .next()
                .await
                .ok_or_else(|| PluginError::Transport("plugin channel closed".to_string()))?
                .map_err(|err| PluginError::Transport(err.to_string()))?;

            let reply: ReplyFrame = serde_json::from_slice(&frame)?;
            if reply.id == id {
                return Ok(reply.reply);
            }
            tracing::warn!(plugin = %self.name, id = reply.id, "dropping stale plugin reply");
        }
    }

    /// Teardown: deadline-bounded `Cleanup` RPC, then kill the child.
    pub async fn shutdown(mut self) {
        match timeout(CLEANUP_TIMEOUT, self.call(Request::Cleanup)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::error!(plugin = %self.name, error = %err, "plugin cleanup call failed")
            }
            Err(_) => tracing::warn!(plugin = %self.name, "plugin cleanup timed out"),
        }
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(plugin = %self.name, error = %err, "plugin already exited");
        }
        let _ = self.child.wait().await;
    }
}
