//! Test utilities for the ambry asset pipeline.
//!
//! # Overview
//!
//! - [`MockContentManager`] - a content manager that records finalize calls
//! - [`Texture`] / [`TextureLoader`] - an asset that requires finalization
//! - [`CountingLoader`] - wraps any loader and counts how often it runs
//! - [`ForwardOnly`] - hides `Seek` from a reader
//! - [`pump_until`] - ticks a scheduler until a condition holds or a deadline passes
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ambry_assets::prelude::*;
//! use ambry_test_utils::*;
//!
//! let fs = MemoryAssetFs::new();
//! fs.insert_container("texture.Grass", &texture_container(&[1, 2, 3])).unwrap();
//!
//! let content = Arc::new(MockContentManager::new());
//! let config = AssetManagerConfig::new().with_content_manager(content.clone());
//! let manager = AssetManager::with_config(fs, loaders(), config);
//! let scheduler = Scheduler::new();
//! scheduler.spawn(manager.run_finalizer()).detach();
//!
//! let grass = manager.get::<Texture>("texture.Grass").unwrap();
//! assert_eq!(pump_until_settled(&scheduler, &grass), AssetState::Ready);
//! assert_eq!(content.count_uploads(), 1);
//! ```

mod assets;
mod io;
mod mock_content;

use std::thread;
use std::time::{Duration, Instant};

use ambry_assets::Asset;
use ambry_assets::loader::LoaderRegistry;
use ambry_assets::reference::AssetRef;
use ambry_assets::scheduler::Scheduler;
use ambry_assets::state::AssetState;

pub use assets::*;
pub use io::*;
pub use mock_content::*;

/// How long [`pump_until`] waits before giving up.
pub const PUMP_DEADLINE: Duration = Duration::from_secs(5);

/// Install a test subscriber once; later calls are no-ops.
pub fn init_logging() {
    let _ = ambry_core::logging::try_init(&ambry_core::logging::LogConfig::default());
}

/// The built-in loaders plus [`TextureLoader`].
pub fn loaders() -> LoaderRegistry {
    LoaderRegistry::with_builtin().with(TextureLoader)
}

/// Tick `scheduler` until `condition` holds; returns `false` on timeout.
///
/// The loader thread runs independently, so each iteration also sleeps briefly to let
/// it make progress.
pub fn pump_until(scheduler: &Scheduler, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PUMP_DEADLINE;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        scheduler.tick();
        thread::sleep(Duration::from_millis(1));
    }
}

/// Block without ticking until `condition` holds; returns `false` on timeout.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PUMP_DEADLINE;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

/// Tick until `reference` is `Ready` or `Unavailable` and return that state.
///
/// # Panics
///
/// Panics if the reference does not settle before [`PUMP_DEADLINE`].
pub fn pump_until_settled<T: Asset>(scheduler: &Scheduler, reference: &impl AssetRef<T>) -> AssetState {
    assert!(
        pump_until(scheduler, || reference.state().is_terminal()),
        "reference did not settle within {:?} (state: {})",
        PUMP_DEADLINE,
        reference.state()
    );
    reference.state()
}
