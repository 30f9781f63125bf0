//! Tag-based filtering

use zship_protocol::Tag;

use crate::FilterError;

/// Filter over a record's tag set. Entries are configured as `tag:value`
/// strings and compared for exact equality against each tag.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    accepted: Vec<Tag>,
    rejected: Vec<Tag>,
}

impl TagFilter {
    pub fn new(accepted: &[String], rejected: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            accepted: parse_entries(accepted)?,
            rejected: parse_entries(rejected)?,
        })
    }

    /// Apply the accept/reject rule to a tag set. Rejection wins: a tag
    /// matching a rejected entry overrides any accepted match.
    pub fn accept_tags(&self, tags: &[Tag]) -> bool {
        if self.accepted.is_empty() && self.rejected.is_empty() {
            return true;
        }

        let mut accepted = self.accepted.is_empty();
        for tag in tags {
            if self.accepted.contains(tag) {
                accepted = true;
                break;
            }
        }

        for tag in tags {
            if self.rejected.contains(tag) {
                accepted = false;
            }
        }
        accepted
    }
}

fn parse_entries(entries: &[String]) -> Result<Vec<Tag>, FilterError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(tag, value)| Tag::new(tag, value))
                .ok_or_else(|| FilterError::InvalidTagEntry(entry.clone()))
        })
        .collect()
}
