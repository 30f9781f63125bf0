//! The fixed metric catalog

use once_cell::sync::Lazy;
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, Opts};

use crate::REGISTRY;

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let vec = IntCounterVec::new(Opts::new(name, help), labels).expect("valid metric definition");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("metric registered once");
    vec
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let vec = GaugeVec::new(Opts::new(name, help), labels).expect("valid metric definition");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("metric registered once");
    vec
}

static LINES_PARSED: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_lines_parsed_total",
        "Total number of processed export file lines",
        &["file_index", "export_type"],
    )
});

static LINES_INVALID: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_lines_invalid_total",
        "Total number of export file lines with invalid data",
        &["file_index", "export_type"],
    )
});

static NDJSON_LINES: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_ndjson_lines_total",
        "Total number of NDJSON lines received per endpoint",
        &["endpoint"],
    )
});

static NDJSON_PARSE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_ndjson_parse_errors_total",
        "Total number of NDJSON parse errors per endpoint",
        &["endpoint"],
    )
});

static BUFFER_SIZE: Lazy<GaugeVec> = Lazy::new(|| {
    gauge_vec(
        "zship_buffer_size",
        "Configured size of the internal batch buffer",
        &["export_type"],
    )
});

static BUFFER_USAGE: Lazy<GaugeVec> = Lazy::new(|| {
    gauge_vec(
        "zship_buffer_usage",
        "Records currently held in the internal batch buffer",
        &["export_type"],
    )
});

static SHIPPING_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_shipping_operations_total",
        "Total number of shipping operations",
        &["target", "plugin", "export_type"],
    )
});

static SHIPPING_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "zship_shipping_errors_total",
        "Total number of shipping errors",
        &["target", "plugin", "export_type"],
    )
});

static PSQL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    gauge_vec(
        "zship_psql_connection_stats",
        "Connection pool statistics of the relational sink",
        &["target", "plugin", "conn"],
    )
});

static PLUGIN_INFO: Lazy<GaugeVec> = Lazy::new(|| {
    gauge_vec(
        "zship_plugin_info",
        "Information about loaded plugins",
        &["plugin", "version"],
    )
});

pub fn lines_parsed(file_index: usize, export_type: &str) -> IntCounter {
    LINES_PARSED.with_label_values(&[&file_index.to_string(), export_type])
}

pub fn lines_invalid(file_index: usize, export_type: &str) -> IntCounter {
    LINES_INVALID.with_label_values(&[&file_index.to_string(), export_type])
}

pub fn ndjson_lines(endpoint: &str) -> IntCounter {
    NDJSON_LINES.with_label_values(&[endpoint])
}

pub fn ndjson_parse_errors(endpoint: &str) -> IntCounter {
    NDJSON_PARSE_ERRORS.with_label_values(&[endpoint])
}

pub fn buffer_size(export_type: &str) -> Gauge {
    BUFFER_SIZE.with_label_values(&[export_type])
}

pub fn buffer_usage(export_type: &str) -> Gauge {
    BUFFER_USAGE.with_label_values(&[export_type])
}

pub fn shipping_operations(target: &str, plugin: &str, export_type: &str) -> IntCounter {
    SHIPPING_OPERATIONS.with_label_values(&[target, plugin, export_type])
}

pub fn shipping_errors(target: &str, plugin: &str, export_type: &str) -> IntCounter {
    SHIPPING_ERRORS.with_label_values(&[target, plugin, export_type])
}

/// Pool gauge for the relational sink; `conn` is one of `idle`, `max`, `used`.
pub fn psql_connections(target: &str, plugin: &str, conn: &str) -> Gauge {
    PSQL_CONNECTIONS.with_label_values(&[target, plugin, conn])
}

/// Mark a plugin as loaded.
pub fn plugin_info(plugin: &str, version: &str) {
    PLUGIN_INFO.with_label_values(&[plugin, version]).set(1.0);
}

/// Register the build-info marker. Called once at startup; the labels carry
/// the values, the gauge is always 1.
pub fn build_info(version: &str, commit: &str, build_date: &str) {
    let gauge = Gauge::with_opts(
        Opts::new("zship_build_info", "Build information")
            .const_label("version", version)
            .const_label("commit", commit)
            .const_label("build_date", build_date),
    )
    .expect("valid metric definition");
    if REGISTRY.register(Box::new(gauge.clone())).is_ok() {
        gauge.set(1.0);
    }
}

/// The shipped/failed counter pair for one (target, kind), prepared at sink
/// construction so the hot path touches no label lookups.
#[derive(Clone)]
pub struct ShippingCounters {
    pub sent: IntCounter,
    pub failed: IntCounter,
}

impl ShippingCounters {
    pub fn new(target: &str, plugin: &str, export_type: &str) -> Self {
        Self {
            sent: shipping_operations(target, plugin, export_type),
            failed: shipping_errors(target, plugin, export_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let before = lines_parsed(0, "history").get();
        lines_parsed(0, "history").inc();
        lines_parsed(0, "history").inc();
        lines_parsed(1, "history").inc();
        assert_eq!(lines_parsed(0, "history").get(), before + 2);
    }

    #[test]
    fn gauges_set_and_read_back() {
        buffer_size("trends").set(100.0);
        buffer_usage("trends").set(7.0);
        assert_eq!(buffer_size("trends").get(), 100.0);
        assert_eq!(buffer_usage("trends").get(), 7.0);
    }

    #[test]
    fn shipping_counters_share_the_vec() {
        let counters = ShippingCounters::new("t1", "print", "events");
        let before = counters.sent.get();
        counters.sent.inc();
        assert_eq!(shipping_operations("t1", "print", "events").get(), before + 1);
    }

    #[test]
    fn build_info_registers_once() {
        build_info("1.0", "abc", "today");
        // A second call with different labels must not panic.
        build_info("1.0", "def", "today");
    }
}
