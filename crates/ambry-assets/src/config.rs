//! Asset manager configuration.

use std::fmt;
use std::sync::Arc;

use crate::finalize::ContentManager;

/// Default name of the background loader thread.
pub const DEFAULT_LOADER_THREAD_NAME: &str = "ambry-asset-loader";

/// Settings for an [`AssetManager`](crate::manager::AssetManager).
///
/// # Example
///
/// ```
/// use ambry_assets::config::AssetManagerConfig;
///
/// let config = AssetManagerConfig::new()
///     .with_loader_thread_name("game-assets")
///     .with_finalize_budget(4);
/// assert_eq!(config.finalize_budget, 4);
/// ```
#[derive(Clone)]
pub struct AssetManagerConfig {
    /// Name given to the background loader thread.
    pub loader_thread_name: String,
    /// Maximum number of assets finalized per scheduler tick. Zero is treated as one.
    pub finalize_budget: usize,
    /// Host resources handed to finalize hooks.
    pub content_manager: Option<Arc<dyn ContentManager>>,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            loader_thread_name: DEFAULT_LOADER_THREAD_NAME.to_string(),
            finalize_budget: 1,
            content_manager: None,
        }
    }
}

impl fmt::Debug for AssetManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManagerConfig")
            .field("loader_thread_name", &self.loader_thread_name)
            .field("finalize_budget", &self.finalize_budget)
            .field("content_manager", &self.content_manager.is_some())
            .finish()
    }
}

impl AssetManagerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the loader thread name.
    pub fn with_loader_thread_name(mut self, name: impl Into<String>) -> Self {
        self.loader_thread_name = name.into();
        self
    }

    /// Set how many assets are finalized per tick.
    pub fn with_finalize_budget(mut self, budget: usize) -> Self {
        self.finalize_budget = budget;
        self
    }

    /// Hand a content manager to finalize hooks.
    pub fn with_content_manager(mut self, manager: Arc<dyn ContentManager>) -> Self {
        self.content_manager = Some(manager);
        self
    }

    pub(crate) fn effective_budget(&self) -> usize {
        self.finalize_budget.max(1)
    }
}
