//! Export file name catalog
//!
//! The upstream server writes each export stream to one "main process" file
//! plus one file per DB syncer; problem events additionally get a task
//! manager file. These names are fixed by the server, not by us.

use crate::ExportKind;

/// Extra events file written by the upstream task manager process.
pub const TASK_MANAGER_FILE: &str = "problems-task-manager-1.ndjson";

/// File written by the main server process for the given kind (index 0).
pub fn main_file(kind: ExportKind) -> &'static str {
    match kind {
        ExportKind::History => "history-main-process-0.ndjson",
        ExportKind::Trends => "trends-main-process-0.ndjson",
        ExportKind::Events => "problems-main-process-0.ndjson",
    }
}

/// File written by DB syncer `index` (1-based) for the given kind.
pub fn syncer_file(kind: ExportKind, index: usize) -> String {
    match kind {
        ExportKind::History => format!("history-history-syncer-{index}.ndjson"),
        ExportKind::Trends => format!("trends-history-syncer-{index}.ndjson"),
        ExportKind::Events => format!("problems-history-syncer-{index}.ndjson"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_match_server_patterns() {
        assert_eq!(main_file(ExportKind::History), "history-main-process-0.ndjson");
        assert_eq!(main_file(ExportKind::Events), "problems-main-process-0.ndjson");
        assert_eq!(syncer_file(ExportKind::Trends, 3), "trends-history-syncer-3.ndjson");
        assert_eq!(syncer_file(ExportKind::Events, 1), "problems-history-syncer-1.ndjson");
    }
}
