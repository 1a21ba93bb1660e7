//! The asset manager: name map, background loader thread and finalization queue.

use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak, mpsc};
use std::thread;

use ambry_core::collections::HashMap;
use ambry_core::profiling::profile_scope;
use futures_lite::future::{block_on, yield_now};
use parking_lot::Mutex;

use crate::Asset;
use crate::config::AssetManagerConfig;
use crate::container::ReadableContainer;
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::finalize::FinalizeContext;
use crate::fs::{CompiledAssetFs, NotifierId};
use crate::loader::{LoadContext, LoadedAsset, LoaderRegistry};
use crate::preference::PreferenceListReference;
use crate::reference::{AssetReference, LoadTicket};
use crate::state::AssetState;

/// A tracked reference with its asset type erased.
trait ErasedReference: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn asset_type_name(&self) -> &'static str;

    /// Match a loaded asset against this reference and stage it for finalization.
    fn accept(
        &self,
        loaded: LoadedAsset,
        loaded_type: &'static str,
    ) -> AssetResult<Box<dyn PendingFinalize>>;

    fn fail_unless_ready(&self, error: Arc<AssetError>) -> bool;
}

impl<T: Asset> ErasedReference for AssetReference<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn asset_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn accept(
        &self,
        loaded: LoadedAsset,
        loaded_type: &'static str,
    ) -> AssetResult<Box<dyn PendingFinalize>> {
        let asset = loaded
            .downcast::<T>()
            .map_err(|_| AssetError::TypeMismatch {
                name: self.name().to_string(),
                expected: T::type_name(),
                actual: loaded_type,
            })?;

        let (ticket, stored) = self.update_unless_ready(Arc::clone(&asset));
        if !stored {
            tracing::debug!("'{}' reloaded in the background; keeping the ready value", self.name());
        }
        Ok(Box::new(Staged {
            asset,
            reference: self.clone(),
            ticket,
        }))
    }

    fn fail_unless_ready(&self, error: Arc<AssetError>) -> bool {
        AssetReference::fail_unless_ready(self, error)
    }
}

enum Finalized {
    Ready { version: u32 },
    Reloaded { version: u32 },
    Failed(Arc<AssetError>),
    Discarded(Arc<AssetError>),
    /// A newer load outcome was recorded while this value waited.
    Superseded,
}

trait PendingFinalize: Send {
    fn name(&self) -> &str;

    fn finalize(self: Box<Self>, ctx: &FinalizeContext) -> Finalized;
}

/// A loaded value waiting for its reference to become ready.
struct Staged<T> {
    asset: Arc<T>,
    reference: AssetReference<T>,
    ticket: LoadTicket,
}

impl<T: Asset> PendingFinalize for Staged<T> {
    fn name(&self) -> &str {
        self.reference.name()
    }

    fn finalize(self: Box<Self>, ctx: &FinalizeContext) -> Finalized {
        let Staged {
            asset,
            reference,
            ticket,
        } = *self;
        if !reference.is_current(ticket) {
            return Finalized::Superseded;
        }

        let result = if asset.requires_finalization() {
            match asset.finalize(ctx) {
                Err(err) if err.is_no_content_manager() => Ok(()),
                other => other,
            }
        } else {
            Ok(())
        };

        let result = result
            .and_then(|()| reference.update(Arc::clone(&asset), AssetState::Ready, ticket));
        match result {
            Ok(Some(AssetState::Ready)) => Finalized::Reloaded {
                version: reference.version(),
            },
            Ok(Some(_)) => Finalized::Ready {
                version: reference.version(),
            },
            Ok(None) => {
                // Finalized but never published.
                if asset.requires_finalization() {
                    asset.release();
                }
                Finalized::Superseded
            }
            Err(err) => {
                let err = Arc::new(err);
                match reference.fail_staged(Arc::clone(&err), ticket) {
                    Some(true) => Finalized::Failed(err),
                    Some(false) => Finalized::Discarded(err),
                    None => Finalized::Superseded,
                }
            }
        }
    }
}

struct Shared {
    fs: Arc<dyn CompiledAssetFs>,
    loaders: LoaderRegistry,
    config: AssetManagerConfig,
    tracked: Mutex<HashMap<String, Arc<dyn ErasedReference>>>,
    load_tx: mpsc::Sender<String>,
    load_rx: Mutex<Option<mpsc::Receiver<String>>>,
    loader_thread: Mutex<Option<thread::JoinHandle<()>>>,
    to_finalize: Mutex<VecDeque<Box<dyn PendingFinalize>>>,
    events: Mutex<AssetEventBuffer>,
    load_requests: AtomicUsize,
    notifier: Mutex<Option<NotifierId>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(id) = self.notifier.get_mut().take() {
            self.fs.unregister_update_notifier(id);
        }
    }
}

/// Owns every tracked asset reference and the pipeline that fills them.
///
/// The manager is a cheaply cloneable handle; clones share the same state. Loading
/// happens on a background thread that starts with the first request; finalization
/// happens on whichever thread drives [`AssetManager::run_finalizer`] (or calls
/// [`AssetManager::finalize_pending`]) once per tick.
///
/// # Example
///
/// ```
/// use ambry_assets::prelude::*;
///
/// let fs = MemoryAssetFs::new();
/// let mut container = WritableContainer::new();
/// container.set_loader(TextLoader::TAG);
/// container.set_data(b"Hello".to_vec());
/// fs.insert_container("text.Hello", &container).unwrap();
///
/// let manager = AssetManager::new(fs, LoaderRegistry::with_builtin());
/// let hello = manager.get::<String>("text.Hello").unwrap();
///
/// while hello.state() != AssetState::Ready {
///     manager.finalize_pending();
///     std::thread::yield_now();
/// }
/// assert_eq!(hello.asset().unwrap().unwrap().as_str(), "Hello");
/// ```
#[derive(Clone)]
pub struct AssetManager {
    shared: Arc<Shared>,
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("tracked", &self.tracked_count())
            .field("pending_finalizations", &self.pending_finalizations())
            .field("loaders", &self.shared.loaders)
            .finish()
    }
}

impl AssetManager {
    /// Create a manager with default settings.
    pub fn new(fs: impl CompiledAssetFs, loaders: LoaderRegistry) -> Self {
        Self::with_config(fs, loaders, AssetManagerConfig::default())
    }

    /// Create a manager with custom settings.
    pub fn with_config(
        fs: impl CompiledAssetFs,
        loaders: LoaderRegistry,
        config: AssetManagerConfig,
    ) -> Self {
        let (load_tx, load_rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            fs: Arc::new(fs),
            loaders,
            config,
            tracked: Mutex::new(HashMap::new()),
            load_tx,
            load_rx: Mutex::new(Some(load_rx)),
            loader_thread: Mutex::new(None),
            to_finalize: Mutex::new(VecDeque::new()),
            events: Mutex::new(AssetEventBuffer::new()),
            load_requests: AtomicUsize::new(0),
            notifier: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let id = shared
            .fs
            .register_update_notifier(Arc::new(move |name: &str| {
                if let Some(shared) = weak.upgrade() {
                    AssetManager { shared }.reload(name);
                }
            }));
        *shared.notifier.lock() = Some(id);

        Self { shared }
    }

    /// Get the reference for `name`, requesting a load the first time.
    ///
    /// Returns immediately; the reference starts `NotReady`. Every later call for the
    /// same name returns the same reference. Requesting a name under a different asset
    /// type than it is tracked as fails with [`AssetError::TypeMismatch`].
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<AssetReference<T>> {
        let reference = {
            let mut tracked = self.shared.tracked.lock();
            if let Some(existing) = tracked.get(name) {
                return existing
                    .as_any()
                    .downcast_ref::<AssetReference<T>>()
                    .cloned()
                    .ok_or_else(|| AssetError::TypeMismatch {
                        name: name.to_string(),
                        expected: T::type_name(),
                        actual: existing.asset_type_name(),
                    });
            }

            let reference = AssetReference::<T>::new(name);
            tracked.insert(name.to_string(), Arc::new(reference.clone()));
            reference
        };

        tracing::debug!("Tracking '{}' as {}", name, T::type_name());
        if !self.enqueue(name) {
            reference.fail(Arc::new(AssetError::LoaderFailed {
                name: name.to_string(),
                message: "the loader thread is not running".to_string(),
            }));
        }
        Ok(reference)
    }

    /// Get references for every name and present them as one, most preferred first.
    pub fn get_preferred<T: Asset>(
        &self,
        names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> AssetResult<PreferenceListReference<T>> {
        let entries = names
            .into_iter()
            .map(|name| self.get::<T>(name.as_ref()))
            .collect::<AssetResult<Vec<_>>>()?;
        Ok(PreferenceListReference::new(entries))
    }

    /// Queue a tracked asset for loading again.
    ///
    /// The reference keeps its current state and value until the new load finishes.
    /// Returns `false` if `name` is not tracked.
    pub fn reload(&self, name: &str) -> bool {
        if !self.is_tracked(name) {
            return false;
        }
        tracing::debug!("Reload requested for '{}'", name);
        self.enqueue(name)
    }

    /// Read the dependency list of a compiled asset without loading it.
    pub fn dependencies(&self, name: &str) -> AssetResult<Vec<String>> {
        let stream = self.shared.fs.get(name)?;
        let container =
            ReadableContainer::from_stream(stream, true).map_err(|e| e.with_name(name))?;
        Ok(container.dependencies().to_vec())
    }

    /// Returns `true` if a reference exists for `name`.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.shared.tracked.lock().contains_key(name)
    }

    /// Number of tracked references.
    pub fn tracked_count(&self) -> usize {
        self.shared.tracked.lock().len()
    }

    /// Total number of loads ever queued, reloads included.
    pub fn load_requests(&self) -> usize {
        self.shared.load_requests.load(Ordering::Relaxed)
    }

    /// Number of loaded assets waiting for finalization.
    pub fn pending_finalizations(&self) -> usize {
        self.shared.to_finalize.lock().len()
    }

    /// The registered loaders.
    pub fn loaders(&self) -> &LoaderRegistry {
        &self.shared.loaders
    }

    /// The settings this manager was created with.
    pub fn config(&self) -> &AssetManagerConfig {
        &self.shared.config
    }

    /// Take every event recorded since the last call, oldest first.
    pub fn drain_events(&self) -> Vec<AssetEvent> {
        self.shared.events.lock().take()
    }

    /// Finalize up to the configured budget of loaded assets; returns how many ran.
    ///
    /// Must be called from the thread that owns the host's content (the scheduler
    /// thread). [`AssetManager::run_finalizer`] calls this once per tick.
    pub fn finalize_pending(&self) -> usize {
        profile_scope!("finalize_pending");

        let budget = self.shared.config.effective_budget();
        let mut finalized = 0;
        while finalized < budget {
            let Some(pending) = self.shared.to_finalize.lock().pop_front() else {
                break;
            };

            let name = pending.name().to_string();
            let ctx = FinalizeContext::new(&name, self.shared.config.content_manager.clone());
            let outcome = pending.finalize(&ctx);
            self.record(name, outcome);
            finalized += 1;
        }
        finalized
    }

    /// The long-lived finalization task: one [`finalize_pending`] step per poll.
    ///
    /// Spawn it on a [`Scheduler`](crate::scheduler::Scheduler). The task ends once every
    /// handle to the manager has been dropped.
    ///
    /// [`finalize_pending`]: AssetManager::finalize_pending
    pub fn run_finalizer(&self) -> impl Future<Output = ()> + 'static {
        let weak = Arc::downgrade(&self.shared);
        async move {
            loop {
                match weak.upgrade() {
                    Some(shared) => {
                        AssetManager { shared }.finalize_pending();
                    }
                    None => break,
                }
                yield_now().await;
            }
            tracing::debug!("Asset manager dropped; finalizer exiting");
        }
    }

    fn record(&self, name: String, outcome: Finalized) {
        let event = match outcome {
            Finalized::Ready { version } => {
                tracing::info!("Asset '{}' is ready", name);
                AssetEvent::Ready { name, version }
            }
            Finalized::Reloaded { version } => {
                tracing::info!("Asset '{}' reloaded (version {})", name, version);
                AssetEvent::Reloaded { name, version }
            }
            Finalized::Failed(error) => {
                tracing::error!("Asset '{}' failed to finalize: {}", name, error);
                AssetEvent::Failed { name, error }
            }
            Finalized::Discarded(error) => {
                tracing::warn!(
                    "Reload of '{}' failed to finalize, keeping the ready value: {}",
                    name,
                    error
                );
                AssetEvent::ReloadDiscarded { name, error }
            }
            Finalized::Superseded => {
                tracing::debug!("Dropping a stale load of '{}'", name);
                return;
            }
        };
        self.shared.events.lock().push(event);
    }

    /// Send `name` to the loader thread, starting it if needed.
    fn enqueue(&self, name: &str) -> bool {
        self.ensure_loader_thread();
        match self.shared.load_tx.send(name.to_string()) {
            Ok(()) => {
                self.shared.load_requests.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                tracing::error!("Cannot queue '{}': the loader thread has exited", name);
                false
            }
        }
    }

    fn ensure_loader_thread(&self) {
        let mut handle = self.shared.loader_thread.lock();
        if handle.is_some() {
            return;
        }
        let Some(receiver) = self.shared.load_rx.lock().take() else {
            return;
        };

        let weak = Arc::downgrade(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.loader_thread_name.clone())
            .spawn(move || loader_loop(weak, receiver));
        match spawned {
            Ok(thread) => {
                tracing::debug!(
                    "Started loader thread '{}'",
                    self.shared.config.loader_thread_name
                );
                *handle = Some(thread);
            }
            Err(e) => tracing::error!("Failed to spawn the asset loader thread: {}", e),
        }
    }

    /// Fetch, decode and load one asset on the loader thread.
    fn load(&self, name: &str) {
        profile_scope!("load_asset", name);

        let Some(reference) = self.shared.tracked.lock().get(name).cloned() else {
            return;
        };

        tracing::debug!("Loading '{}'", name);
        let staged = self
            .produce(name)
            .and_then(|(loaded, loaded_type)| reference.accept(loaded, loaded_type));

        match staged {
            Ok(pending) => {
                tracing::debug!("'{}' loaded; queued for finalization", name);
                self.shared.to_finalize.lock().push_back(pending);
            }
            Err(error) => {
                let error = Arc::new(error);
                // Hold the event buffer across the transition so anyone who observes
                // the new state also finds its event.
                let mut events = self.shared.events.lock();
                let event = if reference.fail_unless_ready(Arc::clone(&error)) {
                    tracing::error!("Failed to load '{}': {}", name, error);
                    AssetEvent::Failed {
                        name: name.to_string(),
                        error,
                    }
                } else {
                    tracing::warn!("Reload of '{}' failed, keeping the ready value: {}", name, error);
                    AssetEvent::ReloadDiscarded {
                        name: name.to_string(),
                        error,
                    }
                };
                events.push(event);
            }
        }
    }

    fn produce(&self, name: &str) -> AssetResult<(LoadedAsset, &'static str)> {
        let stream = self.shared.fs.get(name).map_err(|e| e.with_name(name))?;
        let container =
            ReadableContainer::from_stream(stream, false).map_err(|e| e.with_name(name))?;
        let tag = container.loader()?;
        let loader = self
            .shared
            .loaders
            .get(&tag)
            .ok_or(AssetError::NoLoader { tag })?;

        let ctx = LoadContext::new(name, &container, self);
        let loaded = block_on(loader.load_erased(ctx))?;
        Ok((loaded, loader.asset_type_name()))
    }
}

thread_local! {
    static ON_LOADER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Returns `true` on a manager's loader thread.
pub(crate) fn on_loader_thread() -> bool {
    ON_LOADER_THREAD.with(Cell::get)
}

fn loader_loop(weak: Weak<Shared>, receiver: mpsc::Receiver<String>) {
    ON_LOADER_THREAD.with(|flag| flag.set(true));
    // Ends when every manager handle (and with it the sender) is gone.
    while let Ok(name) = receiver.recv() {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        AssetManager { shared }.load(&name);
    }
    tracing::debug!("Asset loader thread exiting");
}
