//! Host-group-based filtering

/// Filter over a record's host-group list. Same accept/reject structure as
/// the tag filter, evaluated over plain group names; a rejected match
/// returns immediately.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    accepted: Vec<String>,
    rejected: Vec<String>,
}

impl GroupFilter {
    pub fn new(accepted: Vec<String>, rejected: Vec<String>) -> Self {
        Self { accepted, rejected }
    }

    pub fn accept_groups(&self, groups: &[String]) -> bool {
        if self.accepted.is_empty() && self.rejected.is_empty() {
            return true;
        }

        // Whitelist mode starts pessimistic, blacklist mode optimistic.
        let mut accepted = self.accepted.is_empty();
        for group in groups {
            if self.accepted.contains(group) {
                accepted = true;
                break;
            }
        }

        for group in groups {
            if self.rejected.contains(group) {
                return false;
            }
        }
        accepted
    }
}
