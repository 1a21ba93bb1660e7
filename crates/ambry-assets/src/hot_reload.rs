//! Hot reload support for compiled assets on disk.
//!
//! Watches a [`LocalAssetFs`] root and turns file changes into update notifications,
//! which an [`AssetManager`](crate::manager::AssetManager) answers with a reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ambry_core::collections::HashSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{AssetError, AssetResult};
use crate::fs::LocalAssetFs;

fn watch_error(path: &Path, err: notify::Error) -> AssetError {
    AssetError::Io {
        name: path.display().to_string(),
        source: std::io::Error::other(err),
    }
}

/// Names of the compiled assets touched by one filesystem event, deduplicated.
fn changed_names(fs: &LocalAssetFs, event: &Event) -> Vec<String> {
    if !matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    event
        .paths
        .iter()
        .filter_map(|path| fs.name_for(path))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Keeps a directory watch alive; dropping it stops the notifications.
pub struct AssetWatcher {
    watcher: RecommendedWatcher,
    watched_dirs: Vec<PathBuf>,
}

impl AssetWatcher {
    fn new(fs: &LocalAssetFs) -> AssetResult<Self> {
        // The callback must not keep the filesystem alive.
        let target = Arc::downgrade(&fs.inner);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Some(inner) = target.upgrade() else {
                return;
            };
            let fs = LocalAssetFs { inner };
            match res {
                Ok(event) => {
                    for name in changed_names(&fs, &event) {
                        tracing::debug!("Compiled asset changed on disk: {}", name);
                        fs.notify_changed(&name);
                    }
                }
                Err(e) => tracing::error!("File watcher error: {}", e),
            }
        })
        .map_err(|e| watch_error(fs.root(), e))?;

        Ok(Self {
            watcher,
            watched_dirs: Vec::new(),
        })
    }

    /// Watch another directory below the filesystem root.
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> AssetResult<()> {
        let path = path.as_ref();
        if !self.watched_dirs.iter().any(|dir| dir == path) {
            self.watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| watch_error(path, e))?;
            self.watched_dirs.push(path.to_path_buf());
            tracing::debug!("Watching directory for changes: {}", path.display());
        }
        Ok(())
    }

    /// Get the list of watched directories.
    pub fn watched_directories(&self) -> &[PathBuf] {
        &self.watched_dirs
    }
}

impl std::fmt::Debug for AssetWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetWatcher")
            .field("watched_dirs", &self.watched_dirs)
            .finish()
    }
}

impl LocalAssetFs {
    /// Start watching the root directory for changed compiled files.
    ///
    /// Notifications stop when the returned watcher is dropped.
    pub fn watch(&self) -> AssetResult<AssetWatcher> {
        let mut watcher = AssetWatcher::new(self)?;
        watcher.watch_directory(self.root())?;
        Ok(watcher)
    }
}
