//! Daemon lifecycle: build, gate, run, shut down

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use zship_config::{Config, Mode};
use zship_sources::{wait_until_ready, FileInput, HttpInput, Input};
use zship_zabbix::{ServerConfig, DEFAULT_DELAY};

use crate::sinks::build_sink;

pub async fn run(config: Config) -> Result<()> {
    info!(version = crate::VERSION, mode = ?config.mode, "zshipd starting");

    // Plugins are optional; a bad plugins directory costs those targets,
    // not the process.
    if let Some(dir) = &config.plugins_dir {
        match zship_plugin::registry().load_dir(dir) {
            Ok(count) => info!(count, dir = %dir.display(), "plugins discovered"),
            Err(err) => error!(error = %err, dir = %dir.display(), "failed to load plugins"),
        }
    }

    let global_filter = zship_filter::Filter::from_rule(&config.filter)
        .context("invalid global filter")?;

    let mut input: Box<dyn Input> = match config.mode {
        Mode::File => {
            let server = ServerConfig::load(&config.server_config)
                .context("failed to read server configuration")?;
            Box::new(
                FileInput::new(
                    server,
                    config.data_dir.clone(),
                    config.batch_size(),
                    global_filter,
                )
                .context("export ingestion unavailable")?,
            )
        }
        Mode::Http => Box::new(HttpInput::new(
            listen_addr(&config)?,
            config.batch_size(),
            global_filter,
        )),
    };

    register_targets(input.as_mut(), &config).await;

    // In file mode the metrics endpoint needs its own listener; the HTTP
    // input serves /metrics from its own router.
    let cancel = CancellationToken::new();
    let metrics_task = match config.mode {
        Mode::File => {
            let addr = listen_addr(&config)?;
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(err) = zship_metrics::serve(addr, cancel).await {
                    error!(error = %err, "metrics endpoint failed");
                }
            }))
        }
        Mode::Http => None,
    };

    // Hold ingestion until the upstream node is (or becomes) active.
    wait_until_ready(input.as_ref(), DEFAULT_DELAY).await;
    info!("input is active");

    input.start().await.context("failed to start input")?;

    wait_for_shutdown_signal().await;
    info!("shutting down");

    input.stop().await;
    cancel.cancel();
    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    info!("exiting");
    Ok(())
}

fn listen_addr(config: &Config) -> Result<SocketAddr> {
    let addr = format!(
        "{}:{}",
        config.http.listen_address, config.http.listen_port
    );
    addr.parse()
        .with_context(|| format!("invalid listen address '{addr}'"))
}

/// Build every configured target and attach it to the subjects of the
/// kinds it subscribed to. A target that fails to initialize is skipped;
/// the others keep running.
async fn register_targets(input: &mut dyn Input, config: &Config) {
    for target in &config.targets {
        match build_sink(target, config).await {
            Ok(sink) => {
                for kind in &target.source {
                    input.register(*kind, Arc::clone(&sink));
                }
                info!(target = %target.name, plugin = target.sink_type.label(), "target registered");
            }
            Err(err) => {
                warn!(target = %target.name, error = %err, "failed to register target");
            }
        }
    }
}

async fn wait_for_shutdown_signal() {
    let mut term = signal(SignalKind::terminate()).expect("signal handler installed");
    let mut quit = signal(SignalKind::quit()).expect("signal handler installed");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
        _ = quit.recv() => {}
    }
}
