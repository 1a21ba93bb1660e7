//! Asset containers, typed references and the background-loading asset manager.
//!
//! A named asset (`"texture.Player"`) is compiled into a [`container`], served by a
//! [`CompiledAssetFs`](fs::CompiledAssetFs), decoded on a background thread by the
//! [`AssetLoader`](loader::AssetLoader) its container names, then finalized on the
//! thread that ticks the [`Scheduler`](scheduler::Scheduler).
//!
//! ```no_run
//! use ambry_assets::prelude::*;
//!
//! let fs = MemoryAssetFs::new();
//! let manager = AssetManager::new(fs, LoaderRegistry::with_builtin());
//! let scheduler = Scheduler::new();
//! scheduler.spawn(manager.run_finalizer()).detach();
//!
//! let greeting = manager.get::<String>("text.Greeting").unwrap();
//! while !greeting.state().is_terminal() {
//!     scheduler.tick();
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod event;
pub mod finalize;
pub mod fs;
pub mod loader;
pub mod manager;
pub mod preference;
pub mod reference;
pub mod scheduler;
pub mod state;

#[cfg(feature = "hot-reload")]
pub mod hot_reload;

use crate::error::AssetResult;
use crate::finalize::FinalizeContext;

/// A type that can be produced by an [`AssetLoader`](loader::AssetLoader).
///
/// Assets are shared as `Arc<T>` between the loader thread, the finalization step and
/// every reader, so hooks take `&self`.
pub trait Asset: Send + Sync + 'static {
    /// Human-readable name of the asset type, used in errors and logs.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether [`Asset::finalize`] must run on the scheduler thread before the asset
    /// becomes ready.
    fn requires_finalization(&self) -> bool {
        false
    }

    /// Complete the asset on the scheduler thread (for example, upload GPU resources).
    ///
    /// Returning [`AssetError::NoContentManager`](error::AssetError::NoContentManager)
    /// counts as success.
    fn finalize(&self, _ctx: &FinalizeContext) -> AssetResult<()> {
        Ok(())
    }

    /// Called on a ready value when a reload replaces it.
    fn release(&self) {}
}

impl Asset for String {
    fn type_name() -> &'static str {
        "String"
    }
}

impl Asset for Vec<u8> {
    fn type_name() -> &'static str {
        "Vec<u8>"
    }
}

/// Commonly used types.
pub mod prelude {
    pub use crate::Asset;
    pub use crate::config::AssetManagerConfig;
    pub use crate::container::{AssetStream, ReadableContainer, WritableContainer};
    pub use crate::error::{AssetError, AssetResult};
    pub use crate::event::AssetEvent;
    pub use crate::finalize::{ContentManager, FinalizeContext};
    pub use crate::fs::{CompiledAssetFs, LocalAssetFs, MemoryAssetFs, NotifierId};
    pub use crate::loader::{AssetLoader, BytesLoader, LoadContext, LoaderRegistry, TextLoader};
    pub use crate::manager::AssetManager;
    pub use crate::preference::PreferenceListReference;
    pub use crate::reference::{AssetRef, AssetReference};
    pub use crate::scheduler::{Scheduler, Task};
    pub use crate::state::{AssetState, WaitPolicy};
}
