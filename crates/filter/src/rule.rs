//! Filter rule as it appears in configuration

use serde::{Deserialize, Serialize};

/// Which record attribute the rule is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Tag,
    Group,
}

/// The serialized shape of a filter, shared by the global filter and the
/// per-target filters:
///
/// ```yaml
/// filter:
///   kind: tag           # optional, defaults to tag
///   accepted: ["env:prod"]
///   rejected: ["env:staging"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRule {
    pub kind: FilterKind,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

impl FilterRule {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}
