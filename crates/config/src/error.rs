//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("target {index} has no name")]
    UnnamedTarget { index: usize },

    #[error("duplicate target name '{name}'")]
    DuplicateTarget { name: String },

    #[error("invalid {scope} filter: {source}")]
    InvalidFilter {
        scope: String,
        #[source]
        source: zship_filter::FilterError,
    },
}
