//! Export record model
//!
//! Typed records for the three export streams a Zabbix server produces:
//!
//! - [`History`] - individual collected item values
//! - [`Trend`] - hourly min/max/avg rollups of numeric items
//! - [`Event`] - problem and recovery events from triggers
//!
//! All three implement the [`Export`] trait, which gives generic code access
//! to a record's tags, host groups, kind name and a stable byte key. Records
//! deserialize directly from the NDJSON lines Zabbix writes to its export
//! files (and posts in HTTP mode), preserving the numeric/string distinction
//! of the source document.
//!
//! # Example
//!
//! ```
//! use zship_protocol::{Export, History};
//!
//! let line = r#"{"host":{"host":"web-1","name":"web 1"},"itemid":44,
//!               "name":"cpu load","clock":1700000000,"ns":1234,
//!               "value":0.42,"type":0,"groups":["prod"]}"#;
//! let record: History = serde_json::from_str(line).unwrap();
//! assert!(record.is_numeric());
//! assert_eq!(record.key(), b"history_44:1700000000:1234");
//! ```

mod files;
mod kind;
mod record;
mod value;

pub use files::{main_file, syncer_file, TASK_MANAGER_FILE};
pub use kind::{ExportKind, UnknownKindError};
pub use record::{Event, Export, History, HostRef, Tag, Trend, TREND_FIELDS};
pub use value::{Value, ValueType};
