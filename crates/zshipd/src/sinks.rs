//! Target to sink construction

use std::sync::Arc;

use anyhow::{anyhow, Result};

use zship_buffer::OfflineBuffer;
use zship_config::{Config, SinkType, TargetConfig};
use zship_filter::Filter;
use zship_plugin::{registry, PluginSink};
use zship_sinks::cloud::CloudMetricSink;
use zship_sinks::print::PrintSink;
use zship_sinks::psql::PostgresSink;
use zship_sinks::pushgateway::PushGatewaySink;
use zship_sinks::remote_write::RemoteWriteSink;
use zship_sinks::{Sink, SinkCore};

/// Build the sink for one target declaration. Initialization failures
/// (unreachable database, missing plugin, bad URL) are reported to the
/// caller, which skips the target.
pub async fn build_sink(target: &TargetConfig, config: &Config) -> Result<Arc<dyn Sink>> {
    let filter = Filter::from_rule(&target.filter)?;
    let buffer = OfflineBuffer::open(
        &config.data_dir,
        &target.name,
        target.offline_buffer_time,
    )?;
    let core = SinkCore::new(
        &target.name,
        target.sink_type.label(),
        filter,
        buffer,
        &target.source,
    );

    let sink: Arc<dyn Sink> = match &target.sink_type {
        SinkType::Print => Arc::new(PrintSink::new(core, &target.connection)),
        SinkType::Psql => {
            Arc::new(PostgresSink::connect(core, &target.connection, &target.options).await?)
        }
        SinkType::CloudMetric => {
            Arc::new(CloudMetricSink::new(core, &target.connection, &target.options)?)
        }
        SinkType::Pushgateway => {
            Arc::new(PushGatewaySink::new(core, &target.connection, &target.options)?)
        }
        SinkType::RemoteWrite => Arc::new(RemoteWriteSink::new(core, &target.connection)?),
        SinkType::Plugin(name) => {
            let plugin = registry()
                .get(name)
                .ok_or_else(|| anyhow!("plugin '{name}' is not loaded"))?;
            Arc::new(
                PluginSink::initialize(
                    core,
                    &plugin,
                    &target.connection,
                    &target.options,
                    &target.source,
                    target.filter.clone(),
                )
                .await?,
            )
        }
    };

    Ok(sink)
}
