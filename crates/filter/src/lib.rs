//! Record filtering
//!
//! A filter decides per record whether it continues down the pipeline. Two
//! concrete shapes share one contract:
//!
//! - [`TagFilter`] (the default) matches a record's tag set against
//!   `accepted`/`rejected` entries of the form `tag:value`.
//! - [`GroupFilter`] applies the same rule to the record's host-group list.
//!
//! The rule, for a record with tag set (or group list) `T`:
//!
//! 1. Both lists empty - the filter is inert and accepts everything.
//! 2. Otherwise start from `accept = accepted.is_empty()`; any member of `T`
//!    found in `accepted` turns acceptance on, and any member found in
//!    `rejected` turns it off. Rejection always wins over acceptance.
//!
//! Filters are applied twice: once globally at the fan-out subject and once
//! locally inside every sink.

mod group;
mod rule;
mod tag;

pub use group::GroupFilter;
pub use rule::{FilterKind, FilterRule};
pub use tag::TagFilter;

use thiserror::Error;
use zship_protocol::Export;

/// Error constructing a filter from a config rule.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Tag entries must look like `tag:value`.
    #[error("invalid tag filter entry '{0}': expected 'tag:value'")]
    InvalidTagEntry(String),
}

/// A configured filter: inert, tag-based or group-based.
#[derive(Debug, Clone, Default)]
pub enum Filter {
    /// Accepts everything; used when no rule is configured.
    #[default]
    Inert,
    Tag(TagFilter),
    Group(GroupFilter),
}

impl Filter {
    /// Build a filter from a config rule. An empty rule yields an inert
    /// filter regardless of its declared kind.
    pub fn from_rule(rule: &FilterRule) -> Result<Self, FilterError> {
        if rule.accepted.is_empty() && rule.rejected.is_empty() {
            return Ok(Filter::Inert);
        }
        match rule.kind {
            FilterKind::Tag => Ok(Filter::Tag(TagFilter::new(&rule.accepted, &rule.rejected)?)),
            FilterKind::Group => Ok(Filter::Group(GroupFilter::new(
                rule.accepted.clone(),
                rule.rejected.clone(),
            ))),
        }
    }

    /// Whether the record passes this filter.
    pub fn accept<T: Export>(&self, record: &T) -> bool {
        match self {
            Filter::Inert => true,
            Filter::Tag(f) => f.accept_tags(record.tags()),
            Filter::Group(f) => f.accept_groups(record.groups()),
        }
    }

    /// Keep only the records that pass this filter.
    pub fn filter_batch<T: Export>(&self, batch: Vec<T>) -> Vec<T> {
        match self {
            Filter::Inert => batch,
            _ => batch.into_iter().filter(|r| self.accept(r)).collect(),
        }
    }
}
