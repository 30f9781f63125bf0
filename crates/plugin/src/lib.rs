//! Out-of-process sinks
//!
//! A plugin is a sink compiled as its own executable. The daemon launches
//! it as a child process and drives it over a local RPC channel:
//!
//! 1. **Discovery** - every executable in the plugins directory is a
//!    candidate, registered under its file stem.
//! 2. **Handshake** - the parent launches the child with a magic-cookie
//!    environment variable; the child binds a Unix socket and prints
//!    `<protocol-version>|<socket-path>` on stdout. A version mismatch
//!    discards the plugin; others keep loading.
//! 3. **Operation** - length-prefixed JSON frames carry `Initialize`,
//!    `Save*` and `Cleanup` requests; save replies report
//!    `{success, processed, failed, error}` and feed the shipping
//!    counters.
//! 4. **Teardown** - a deadline-bounded `Cleanup` RPC, then the child is
//!    killed. A child crash mid-save surfaces as a transport error and is
//!    handled like any other write failure (offline buffer and counters).
//!
//! Plugin binaries use [`serve`] with a [`PluginHandler`] implementation;
//! see `examples/print.rs` for a complete plugin.

mod client;
mod registry;
mod serve;
mod sink;
mod wire;

pub use client::PluginClient;
pub use registry::{registry, DiscoveredPlugin, PluginRegistry};
pub use serve::{serve, PluginHandler, SaveResult};
pub use sink::PluginSink;
pub use wire::{
    handshake_line, parse_handshake, InitializeRequest, PluginInfo, Reply, ReplyFrame, Request,
    RequestFrame, COOKIE_KEY, COOKIE_VALUE, PROTOCOL_VERSION,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid handshake: {0}")]
    Handshake(String),

    #[error("protocol version mismatch: plugin speaks {found}, host speaks {PROTOCOL_VERSION}")]
    VersionMismatch { found: u32 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("plugin call failed: {0}")]
    Rpc(String),

    #[error("plugin '{0}' is not loaded")]
    NotFound(String),
}
