//! Minimal out-of-process sink: prints every record to stderr.
//!
//! Build with `cargo build --example print` and drop the binary into the
//! daemon's `plugins_dir`; configure a target with `type: plugin:print`.

use async_trait::async_trait;
use zship_filter::Filter;
use zship_plugin::{serve, InitializeRequest, PluginHandler, PluginInfo, SaveResult};
use zship_protocol::{Event, History, Trend};

struct PrintPlugin {
    filter: std::sync::Mutex<Filter>,
}

#[async_trait]
impl PluginHandler for PrintPlugin {
    async fn initialize(&self, request: InitializeRequest) -> Result<PluginInfo, String> {
        let filter = Filter::from_rule(&request.filter).map_err(|err| err.to_string())?;
        *self.filter.lock().unwrap() = filter;

        Ok(PluginInfo {
            name: "print".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "zship".to_string(),
            description: "prints records to stderr".to_string(),
        })
    }

    async fn save_history(&self, records: Vec<History>) -> SaveResult {
        let records = self.filter.lock().unwrap().filter_batch(records);
        for record in &records {
            eprintln!(
                "Host: {}; Item: {}; Time: {}; Value: {}",
                record.host.host, record.name, record.clock, record.value
            );
        }
        SaveResult::ok(records.len() as u64)
    }

    async fn save_trends(&self, records: Vec<Trend>) -> SaveResult {
        let records = self.filter.lock().unwrap().filter_batch(records);
        for record in &records {
            eprintln!(
                "Host: {}; Item: {}; Time: {}; Min/Max/Avg: {}/{}/{}",
                record.host.host, record.name, record.clock, record.min, record.max, record.avg
            );
        }
        SaveResult::ok(records.len() as u64)
    }

    async fn save_events(&self, records: Vec<Event>) -> SaveResult {
        let records = self.filter.lock().unwrap().filter_batch(records);
        for record in &records {
            eprintln!(
                "Time: {}; Event: {}; Severity: {}; Problem: {}",
                record.clock, record.eventid, record.severity, record.name
            );
        }
        SaveResult::ok(records.len() as u64)
    }
}

#[tokio::main]
async fn main() {
    let plugin = PrintPlugin {
        filter: std::sync::Mutex::new(Filter::Inert),
    };
    if let Err(err) = serve(plugin).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
