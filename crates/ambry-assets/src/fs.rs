//! Compiled-asset filesystems: where container bytes come from.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ambry_core::collections::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::container::{AssetStream, WritableContainer};
use crate::error::{AssetError, AssetResult};

/// Callback invoked with the name of an asset whose compiled bytes changed.
pub type UpdateNotifier = Arc<dyn Fn(&str) + Send + Sync>;

/// Identifies a registered [`UpdateNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierId(u64);

/// A source of compiled asset containers keyed by asset name.
pub trait CompiledAssetFs: Send + Sync + 'static {
    /// Open the compiled container for `name`.
    ///
    /// Fails with [`AssetError::NotFound`] when there is no such asset.
    fn get(&self, name: &str) -> AssetResult<AssetStream>;

    /// Be told whenever an asset's compiled bytes change.
    fn register_update_notifier(&self, notifier: UpdateNotifier) -> NotifierId;

    /// Stop notifying a previously registered callback.
    fn unregister_update_notifier(&self, id: NotifierId);
}

impl<F: CompiledAssetFs> CompiledAssetFs for Arc<F> {
    fn get(&self, name: &str) -> AssetResult<AssetStream> {
        (**self).get(name)
    }

    fn register_update_notifier(&self, notifier: UpdateNotifier) -> NotifierId {
        (**self).register_update_notifier(notifier)
    }

    fn unregister_update_notifier(&self, id: NotifierId) {
        (**self).unregister_update_notifier(id)
    }
}

/// A set of update notifiers, shared by the filesystem implementations.
#[derive(Default)]
pub struct UpdateNotifiers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(NotifierId, UpdateNotifier)>>,
}

impl UpdateNotifiers {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn register(&self, notifier: UpdateNotifier) -> NotifierId {
        let id = NotifierId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, notifier));
        id
    }

    /// Remove a callback; unknown ids are ignored.
    pub fn unregister(&self, id: NotifierId) {
        self.entries.lock().retain(|(existing, _)| *existing != id);
    }

    /// Invoke every callback with `name`.
    ///
    /// Callbacks run outside the lock, so they may register or unregister notifiers.
    pub fn notify(&self, name: &str) {
        let notifiers: Vec<UpdateNotifier> = self
            .entries
            .lock()
            .iter()
            .map(|(_, notifier)| Arc::clone(notifier))
            .collect();
        tracing::trace!("Notifying {} listeners that '{}' changed", notifiers.len(), name);
        for notifier in notifiers {
            notifier(name);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for UpdateNotifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateNotifiers")
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Default)]
struct MemoryInner {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
    notifiers: UpdateNotifiers,
    forward_only: AtomicBool,
}

/// An in-memory compiled-asset filesystem.
///
/// Clones share the same files. Inserting or removing a file notifies every registered
/// callback, which makes this the usual way to exercise hot reload in tests and tools.
#[derive(Clone, Default)]
pub struct MemoryAssetFs {
    inner: Arc<MemoryInner>,
}

impl fmt::Debug for MemoryAssetFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAssetFs")
            .field("files", &self.len())
            .field("forward_only", &self.is_forward_only())
            .finish()
    }
}

impl MemoryAssetFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store compiled bytes under `name` and notify listeners.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        self.inner.files.write().insert(name.clone(), Arc::from(bytes));
        self.inner.notifiers.notify(&name);
    }

    /// Encode a container and store it under `name`.
    pub fn insert_container(
        &self,
        name: impl Into<String>,
        container: &WritableContainer,
    ) -> AssetResult<()> {
        self.insert(name, container.to_bytes()?);
        Ok(())
    }

    /// Remove `name`, notifying listeners if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.inner.files.write().remove(name).is_some();
        if removed {
            self.inner.notifiers.notify(name);
        }
        removed
    }

    /// Check if bytes exist for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.files.read().contains_key(name)
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.inner.files.read().len()
    }

    /// Returns `true` if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.files.read().is_empty()
    }

    /// Serve streams that cannot seek, as a socket or pipe would.
    pub fn set_forward_only(&self, forward_only: bool) {
        self.inner.forward_only.store(forward_only, Ordering::Relaxed);
    }

    /// Returns `true` if streams are served forward-only.
    pub fn is_forward_only(&self) -> bool {
        self.inner.forward_only.load(Ordering::Relaxed)
    }

    /// Number of registered update notifiers.
    pub fn notifier_count(&self) -> usize {
        self.inner.notifiers.len()
    }
}

impl CompiledAssetFs for MemoryAssetFs {
    fn get(&self, name: &str) -> AssetResult<AssetStream> {
        let bytes = self
            .inner
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                name: name.to_string(),
            })?;

        if self.is_forward_only() {
            Ok(AssetStream::forward(Cursor::new(bytes)))
        } else {
            Ok(AssetStream::seekable(Cursor::new(bytes)))
        }
    }

    fn register_update_notifier(&self, notifier: UpdateNotifier) -> NotifierId {
        self.inner.notifiers.register(notifier)
    }

    fn unregister_update_notifier(&self, id: NotifierId) {
        self.inner.notifiers.unregister(id)
    }
}

/// File extension of compiled containers on disk.
pub const COMPILED_EXTENSION: &str = "bin";

pub(crate) struct LocalInner {
    pub(crate) root: PathBuf,
    pub(crate) notifiers: UpdateNotifiers,
}

/// A directory of compiled containers.
///
/// `texture/Player.bin` under the root is the asset `texture.Player`.
#[derive(Clone)]
pub struct LocalAssetFs {
    pub(crate) inner: Arc<LocalInner>,
}

impl fmt::Debug for LocalAssetFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAssetFs")
            .field("root", &self.inner.root)
            .finish()
    }
}

impl LocalAssetFs {
    /// Serve compiled containers below `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                root: root.as_ref().to_path_buf(),
                notifiers: UpdateNotifiers::new(),
            }),
        }
    }

    /// The directory containers are served from.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// The file that holds `name`.
    ///
    /// Every dot-separated part must be a plain file name; anything that could leave
    /// the root (empty parts, separators, absolute or drive prefixes) is `NotFound`.
    pub fn path_for(&self, name: &str) -> AssetResult<PathBuf> {
        let mut path = self.inner.root.clone();
        for part in name.split('.') {
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(normal)), None) if normal == part => path.push(part),
                _ => {
                    return Err(AssetError::NotFound {
                        name: name.to_string(),
                    });
                }
            }
        }
        path.set_extension(COMPILED_EXTENSION);
        Ok(path)
    }

    /// The asset name a compiled file is served as, if it is one.
    pub fn name_for(&self, path: &Path) -> Option<String> {
        if path.extension()? != COMPILED_EXTENSION {
            return None;
        }
        let relative = match path.strip_prefix(&self.inner.root) {
            Ok(relative) => relative.with_extension(""),
            // Watchers report canonical paths, which may differ from the configured root.
            Err(_) => {
                let root = std::fs::canonicalize(&self.inner.root).ok()?;
                path.strip_prefix(root).ok()?.with_extension("")
            }
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("."))
    }

    /// Encode a container and write it where `name` is served from.
    ///
    /// Listeners are notified when a watcher picks up the write, or explicitly through
    /// [`LocalAssetFs::notify_changed`].
    pub fn write_container(&self, name: &str, container: &WritableContainer) -> AssetResult<()> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AssetError::from(e).with_name(name))?;
        }
        let file = File::create(&path).map_err(|e| AssetError::from(e).with_name(name))?;
        container
            .write_to(std::io::BufWriter::new(file))
            .map_err(|e| e.with_name(name))
    }

    /// Tell listeners that `name` changed.
    pub fn notify_changed(&self, name: &str) {
        self.inner.notifiers.notify(name);
    }
}

impl CompiledAssetFs for LocalAssetFs {
    fn get(&self, name: &str) -> AssetResult<AssetStream> {
        let path = self.path_for(name)?;
        match File::open(&path) {
            Ok(file) => Ok(AssetStream::seekable(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(AssetError::from(e).with_name(name)),
        }
    }

    fn register_update_notifier(&self, notifier: UpdateNotifier) -> NotifierId {
        self.inner.notifiers.register(notifier)
    }

    fn unregister_update_notifier(&self, id: NotifierId) {
        self.inner.notifiers.unregister(id)
    }
}
