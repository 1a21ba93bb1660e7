//! Shared handles to named assets.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_lite::future::yield_now;
use parking_lot::RwLock;

use crate::Asset;
use crate::error::{AssetError, AssetResult};
use crate::manager::on_loader_thread;
use crate::state::{AssetState, WaitPolicy};

/// Read access and cooperative waiting shared by every kind of asset reference.
///
/// The waiting futures poll the state once per scheduler tick and never block the
/// thread that drives them. On the manager's loader thread they do not wait at all: an
/// asset that is still loading there resolves to [`AssetError::WaitOnLoaderThread`].
pub trait AssetRef<T: Asset> {
    /// The current state.
    fn state(&self) -> AssetState;

    /// The current value: `None` until loaded, an error once unavailable.
    fn asset(&self) -> AssetResult<Option<Arc<T>>>;

    /// The error that `asset()` reports while unavailable.
    fn unavailable_error(&self) -> AssetError;

    /// Returns `true` if the state is `Ready`.
    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Yield until the state is `Ready` or `Unavailable`.
    ///
    /// Resolves to `Ok(true)` when ready. When unavailable, resolves to `Ok(false)` under
    /// [`WaitPolicy::Optional`] and to the unavailable error under
    /// [`WaitPolicy::Required`].
    fn wait(&self, policy: WaitPolicy) -> impl Future<Output = AssetResult<bool>> {
        async move {
            loop {
                match self.state() {
                    AssetState::Ready => return Ok(true),
                    AssetState::Unavailable => {
                        return match policy {
                            WaitPolicy::Required => Err(self.unavailable_error()),
                            WaitPolicy::Optional => Ok(false),
                        };
                    }
                    AssetState::NotReady | AssetState::PartiallyReady => {
                        if on_loader_thread() {
                            return Err(AssetError::WaitOnLoaderThread);
                        }
                        yield_now().await
                    }
                }
            }
        }
    }

    /// Yield until ready, failing if the asset becomes unavailable.
    fn wait_until_ready(&self) -> impl Future<Output = AssetResult<()>> {
        async move { self.wait(WaitPolicy::Required).await.map(|_| ()) }
    }

    /// Yield until ready or unavailable; returns whether the asset is ready.
    fn wait_until_ready_optional(&self) -> impl Future<Output = bool> {
        async move { matches!(self.wait(WaitPolicy::Optional).await, Ok(true)) }
    }
}

struct Slot<T> {
    state: AssetState,
    asset: Option<Arc<T>>,
    error: Option<Arc<AssetError>>,
    version: u32,
    generation: u64,
}

/// Identifies the most recent load outcome recorded on a reference.
///
/// Every staged value and every recorded failure takes a new ticket; a staged value
/// whose ticket is no longer current must not be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadTicket(u64);

struct Inner<T> {
    name: String,
    slot: RwLock<Slot<T>>,
}

/// A consistent view of a reference taken under a single lock.
pub(crate) struct Snapshot<T> {
    pub(crate) state: AssetState,
    pub(crate) asset: Option<Arc<T>>,
    pub(crate) error: Option<Arc<AssetError>>,
}

/// A cheaply cloneable handle to one named asset.
///
/// References are handed out before loading completes. The owning
/// [`AssetManager`](crate::manager::AssetManager) is the only writer; everyone else
/// observes the state, the value and the terminal error through a single lock, so a
/// reader never sees a state that disagrees with the value.
pub struct AssetReference<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AssetReference<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for AssetReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.read();
        f.debug_struct("AssetReference")
            .field("name", &self.inner.name)
            .field("state", &slot.state)
            .field("version", &slot.version)
            .finish()
    }
}

impl<T: Asset> AssetReference<T> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                slot: RwLock::new(Slot {
                    state: AssetState::NotReady,
                    asset: None,
                    error: None,
                    version: 0,
                    generation: 0,
                }),
            }),
        }
    }

    /// The asset name this reference was requested with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The current state.
    pub fn state(&self) -> AssetState {
        self.inner.slot.read().state
    }

    /// Returns `true` if the state is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The current value.
    ///
    /// `None` while not ready, `Some` from `PartiallyReady` on, and
    /// [`AssetError::Unavailable`] wrapping the recorded error once unavailable.
    pub fn asset(&self) -> AssetResult<Option<Arc<T>>> {
        let slot = self.inner.slot.read();
        match slot.state {
            AssetState::Unavailable => Err(self.unavailable(slot.error.clone())),
            _ => Ok(slot.asset.clone()),
        }
    }

    /// The error recorded when the reference became unavailable.
    pub fn loading_error(&self) -> Option<Arc<AssetError>> {
        self.inner.slot.read().error.clone()
    }

    /// Number of times a value has been swapped in as `Ready`.
    pub fn version(&self) -> u32 {
        self.inner.slot.read().version
    }

    /// Returns `true` if both handles point at the same reference.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        let slot = self.inner.slot.read();
        Snapshot {
            state: slot.state,
            asset: slot.asset.clone(),
            error: slot.error.clone(),
        }
    }

    fn unavailable(&self, error: Option<Arc<AssetError>>) -> AssetError {
        let source = error.unwrap_or_else(|| {
            Arc::new(AssetError::LoaderFailed {
                name: self.inner.name.clone(),
                message: "no error was recorded".to_string(),
            })
        });
        AssetError::Unavailable {
            name: self.inner.name.clone(),
            source,
        }
    }

    fn invalid(&self, reason: &'static str) -> AssetError {
        AssetError::InvalidTransition {
            name: self.inner.name.clone(),
            reason,
        }
    }

    /// Returns `true` if no outcome newer than `ticket` has been recorded.
    pub(crate) fn is_current(&self, ticket: LoadTicket) -> bool {
        self.inner.slot.read().generation == ticket.0
    }

    /// Store a value and move to a value-bearing state; returns the previous state.
    ///
    /// A previous `Ready` value is released before it is replaced. Returns `Ok(None)`
    /// without touching anything when `ticket` was superseded by a newer outcome.
    pub(crate) fn update(
        &self,
        asset: Arc<T>,
        state: AssetState,
        ticket: LoadTicket,
    ) -> AssetResult<Option<AssetState>> {
        if !state.requires_value() {
            return Err(self.invalid("a value can only be stored as partially ready or ready"));
        }

        let mut slot = self.inner.slot.write();
        if slot.generation != ticket.0 {
            return Ok(None);
        }
        let previous = slot.state;
        if previous == AssetState::Ready
            && let Some(old) = slot.asset.as_ref()
            && !Arc::ptr_eq(old, &asset)
        {
            old.release();
        }

        slot.asset = Some(asset);
        slot.state = state;
        slot.error = None;
        if state == AssetState::Ready {
            slot.version += 1;
        }
        Ok(Some(previous))
    }

    /// Record a freshly loaded value, storing it as `PartiallyReady` unless the
    /// reference is already `Ready`.
    ///
    /// Always takes a new ticket, so older staged values become stale. The flag is
    /// `false` when the reference was ready and keeps its value for now.
    pub(crate) fn update_unless_ready(&self, asset: Arc<T>) -> (LoadTicket, bool) {
        let mut slot = self.inner.slot.write();
        slot.generation += 1;
        let ticket = LoadTicket(slot.generation);
        if slot.state == AssetState::Ready {
            return (ticket, false);
        }
        slot.asset = Some(asset);
        slot.state = AssetState::PartiallyReady;
        slot.error = None;
        (ticket, true)
    }

    /// Move to the terminal `Unavailable` state.
    pub(crate) fn fail(&self, error: Arc<AssetError>) {
        let mut slot = self.inner.slot.write();
        if slot.state == AssetState::Ready
            && let Some(old) = slot.asset.as_ref()
        {
            old.release();
        }
        slot.generation += 1;
        slot.asset = None;
        slot.error = Some(error);
        slot.state = AssetState::Unavailable;
    }

    /// Move to `Unavailable` unless the reference is `Ready`.
    ///
    /// Returns `false` when the reference was ready and keeps its value. Either way the
    /// failure is the newest outcome, so older staged values become stale.
    pub(crate) fn fail_unless_ready(&self, error: Arc<AssetError>) -> bool {
        let mut slot = self.inner.slot.write();
        Self::fail_slot(&mut slot, error)
    }

    /// [`fail_unless_ready`](Self::fail_unless_ready) for a staged value; `None` when
    /// `ticket` was superseded and nothing changed.
    pub(crate) fn fail_staged(&self, error: Arc<AssetError>, ticket: LoadTicket) -> Option<bool> {
        let mut slot = self.inner.slot.write();
        if slot.generation != ticket.0 {
            return None;
        }
        Some(Self::fail_slot(&mut slot, error))
    }

    fn fail_slot(slot: &mut Slot<T>, error: Arc<AssetError>) -> bool {
        slot.generation += 1;
        if slot.state == AssetState::Ready {
            return false;
        }
        slot.asset = None;
        slot.error = Some(error);
        slot.state = AssetState::Unavailable;
        true
    }
}

impl<T: Asset> AssetRef<T> for AssetReference<T> {
    fn state(&self) -> AssetState {
        AssetReference::state(self)
    }

    fn asset(&self) -> AssetResult<Option<Arc<T>>> {
        AssetReference::asset(self)
    }

    fn unavailable_error(&self) -> AssetError {
        self.unavailable(self.loading_error())
    }
}
