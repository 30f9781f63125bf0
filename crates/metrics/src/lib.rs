//! Operational metrics
//!
//! One process-wide registry holding the daemon's fixed metric catalog, plus
//! the `/metrics` exposition endpoint. Every series carries the `zship_`
//! prefix. The catalog:
//!
//! | Metric | Labels | Meaning |
//! |---|---|---|
//! | `zship_lines_parsed_total` | `file_index`, `export_type` | export lines read from a tailed file |
//! | `zship_lines_invalid_total` | `file_index`, `export_type` | lines that failed to parse |
//! | `zship_ndjson_lines_total` | `endpoint` | NDJSON lines received over HTTP |
//! | `zship_ndjson_parse_errors_total` | `endpoint` | HTTP lines that failed to parse |
//! | `zship_buffer_size` | `export_type` | configured subject batch size |
//! | `zship_buffer_usage` | `export_type` | records pending in a subject |
//! | `zship_shipping_operations_total` | `target`, `plugin`, `export_type` | records handed to a sink |
//! | `zship_shipping_errors_total` | `target`, `plugin`, `export_type` | records a sink failed to ship |
//! | `zship_psql_connection_stats` | `target`, `plugin`, `conn` | relational sink pool gauges |
//! | `zship_plugin_info` | `plugin`, `version` | loaded plugin marker |
//! | `zship_build_info` | `version`, `commit`, `build_date` | process build marker |

mod catalog;
mod endpoint;

pub use catalog::{
    build_info, buffer_size, buffer_usage, lines_invalid, lines_parsed, ndjson_lines,
    ndjson_parse_errors, plugin_info, psql_connections, shipping_errors, shipping_operations,
    ShippingCounters,
};
pub use endpoint::{render, router, serve, MetricsServerError};

use once_cell::sync::Lazy;
use prometheus::Registry;

/// The process-wide metric registry. Everything in the catalog registers
/// here; the exposition endpoint gathers from here.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
