//! Export file path generation

use std::path::PathBuf;

use zship_protocol::{main_file, syncer_file, ExportKind, TASK_MANAGER_FILE};

use crate::ServerConfig;

/// All export files for `kind` under the server's export directory, in
/// file-index order: the main-process file at index 0, then one file per DB
/// syncer. Events additionally carry the task-manager file at the end.
///
/// Returns an empty list when exports are disabled upstream.
pub fn export_files(conf: &ServerConfig, kind: ExportKind) -> Vec<PathBuf> {
    let Some(dir) = &conf.export_dir else {
        return Vec::new();
    };

    let mut paths = Vec::with_capacity(conf.db_syncers + 2);
    paths.push(dir.join(main_file(kind)));
    for index in 1..=conf.db_syncers {
        paths.push(dir.join(syncer_file(kind, index)));
    }
    if kind == ExportKind::Events {
        paths.push(dir.join(TASK_MANAGER_FILE));
    }
    paths
}
