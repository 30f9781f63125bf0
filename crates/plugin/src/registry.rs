//! Process-wide plugin registry
//!
//! Discovery only records where each plugin executable lives; processes are
//! launched per target when a sink is built. Lookups vastly outnumber
//! loads, so the map sits behind a read-write lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::PluginError;

/// A discovered plugin executable, registered under its file stem.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub path: PathBuf,
}

/// Name to executable map for all discovered plugins.
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, DiscoveredPlugin>>,
}

static REGISTRY: Lazy<PluginRegistry> = Lazy::new(|| PluginRegistry {
    plugins: RwLock::new(HashMap::new()),
});

/// The process-wide registry.
pub fn registry() -> &'static PluginRegistry {
    &REGISTRY
}

impl PluginRegistry {
    /// Scan `dir` and register every executable file. Re-registering an
    /// already known name is a no-op; unreadable entries are skipped with a
    /// log line. Returns the number of newly registered plugins.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, PluginError> {
        let mut loaded = 0;

        for entry in std::fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::error!(error = %err, "failed to read plugin directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !is_executable_file(&path) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let mut plugins = self.plugins.write();
            if plugins.contains_key(name) {
                tracing::debug!(plugin = name, "plugin already loaded");
                continue;
            }
            tracing::info!(plugin = name, path = %path.display(), "discovered plugin");
            // The version label is refined once the plugin introduces
            // itself during Initialize.
            zship_metrics::plugin_info(name, "unknown");
            plugins.insert(
                name.to_string(),
                DiscoveredPlugin {
                    name: name.to_string(),
                    path: path.clone(),
                },
            );
            loaded += 1;
        }

        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<DiscoveredPlugin> {
        self.plugins.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[cfg(test)]
    fn clear(&self) {
        self.plugins.write().clear();
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
