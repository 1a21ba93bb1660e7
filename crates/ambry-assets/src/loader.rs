//! Asset loader traits and infrastructure.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ambry_core::collections::HashMap;

use crate::Asset;
use crate::container::ReadableContainer;
use crate::error::{AssetError, AssetResult};
use crate::manager::AssetManager;

/// Context provided to asset loaders during loading.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    /// The name of the asset being loaded.
    pub name: &'a str,
    /// The decoded container.
    pub container: &'a ReadableContainer,
    /// The manager running the load, for requesting dependencies.
    ///
    /// Requesting is fine; waiting is not. See [`AssetLoader::load`].
    pub manager: &'a AssetManager,
}

impl<'a> LoadContext<'a> {
    /// Create a new load context.
    pub fn new(name: &'a str, container: &'a ReadableContainer, manager: &'a AssetManager) -> Self {
        Self {
            name,
            container,
            manager,
        }
    }

    /// Build a [`AssetError::LoaderFailed`] for this asset.
    pub fn error(&self, message: impl Into<String>) -> AssetError {
        AssetError::LoaderFailed {
            name: self.name.to_string(),
            message: message.into(),
        }
    }
}

/// Turns a decoded container into a typed asset.
///
/// Each container names its loader in the `Loader` property; the
/// [`LoaderRegistry`] resolves that tag. Loads run on the manager's background thread,
/// which drives the returned future to completion.
///
/// # Example
///
/// ```
/// use std::future::Future;
/// use ambry_assets::prelude::*;
///
/// struct Shader {
///     source: String,
/// }
///
/// impl Asset for Shader {}
///
/// struct ShaderLoader;
///
/// impl AssetLoader for ShaderLoader {
///     type Asset = Shader;
///
///     fn tag(&self) -> &str {
///         "shader"
///     }
///
///     fn load(&self, ctx: LoadContext<'_>) -> impl Future<Output = AssetResult<Shader>> + Send {
///         async move {
///             let source = ctx.container.get_string("Source")?;
///             Ok(Shader { source })
///         }
///     }
/// }
/// ```
pub trait AssetLoader: Send + Sync + 'static {
    /// The asset type this loader produces.
    type Asset: Asset;

    /// The tag containers use to select this loader.
    fn tag(&self) -> &str;

    /// Load an asset from the provided context.
    ///
    /// Runs on the manager's loader thread, one load at a time. A loader may request
    /// other assets through `ctx.manager`, but must not wait for them: a dependency
    /// that is still loading cannot make progress until this load returns, so the
    /// [`AssetRef`](crate::reference::AssetRef) waiting futures resolve to
    /// [`AssetError::WaitOnLoaderThread`](crate::error::AssetError::WaitOnLoaderThread)
    /// here instead of yielding. Dependencies that are already ready or unavailable
    /// resolve as usual.
    fn load(&self, ctx: LoadContext<'_>)
    -> impl Future<Output = AssetResult<Self::Asset>> + Send;
}

/// A loaded asset before it is matched against the requesting reference.
pub type LoadedAsset = Arc<dyn Any + Send + Sync>;

/// The future returned by [`ErasedAssetLoader::load_erased`].
pub type ErasedLoad<'a> = Pin<Box<dyn Future<Output = AssetResult<LoadedAsset>> + Send + 'a>>;

/// Type-erased asset loader for dynamic dispatch.
pub trait ErasedAssetLoader: Send + Sync {
    /// The tag this loader is registered under.
    fn tag(&self) -> &str;

    /// Get a human-readable name for the asset type.
    fn asset_type_name(&self) -> &'static str;

    /// Load an asset and return it type-erased.
    fn load_erased<'a>(&'a self, ctx: LoadContext<'a>) -> ErasedLoad<'a>;
}

impl<L: AssetLoader> ErasedAssetLoader for L {
    fn tag(&self) -> &str {
        AssetLoader::tag(self)
    }

    fn asset_type_name(&self) -> &'static str {
        <L::Asset as Asset>::type_name()
    }

    fn load_erased<'a>(&'a self, ctx: LoadContext<'a>) -> ErasedLoad<'a> {
        Box::pin(async move {
            let asset = self.load(ctx).await?;
            Ok(Arc::new(asset) as LoadedAsset)
        })
    }
}

/// Registry of asset loaders, indexed by tag.
#[derive(Default, Clone)]
pub struct LoaderRegistry {
    by_tag: HashMap<String, Arc<dyn ErasedAssetLoader>>,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.by_tag.keys()).finish()
    }
}

impl LoaderRegistry {
    /// Create a new empty loader registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding [`TextLoader`] and [`BytesLoader`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TextLoader);
        registry.register(BytesLoader);
        registry
    }

    /// Register a loader under its tag, replacing any loader with the same tag.
    pub fn register<L: AssetLoader>(&mut self, loader: L) {
        let tag = AssetLoader::tag(&loader).to_string();
        let loader: Arc<dyn ErasedAssetLoader> = Arc::new(loader);
        if let Some(previous) = self.by_tag.insert(tag.clone(), loader) {
            tracing::debug!(
                "Loader for tag '{}' replaced (was producing {})",
                tag,
                previous.asset_type_name()
            );
        }
    }

    /// Builder-style [`LoaderRegistry::register`].
    pub fn with<L: AssetLoader>(mut self, loader: L) -> Self {
        self.register(loader);
        self
    }

    /// Resolve a loader tag.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn ErasedAssetLoader>> {
        self.by_tag.get(tag)
    }

    /// Check if a loader is registered for a tag.
    pub fn contains(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// Registered tags in no particular order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Returns `true` if no loaders are registered.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Loads the `Data` property as UTF-8 text.
pub struct TextLoader;

impl TextLoader {
    /// The tag containers use for text assets.
    pub const TAG: &'static str = "text";
}

impl AssetLoader for TextLoader {
    type Asset = String;

    fn tag(&self) -> &str {
        Self::TAG
    }

    fn load(&self, ctx: LoadContext<'_>) -> impl Future<Output = AssetResult<String>> + Send {
        async move {
            String::from_utf8(ctx.container.data()?)
                .map_err(|e| ctx.error(format!("Invalid UTF-8: {}", e)))
        }
    }
}

/// Loads the `Data` property as raw bytes.
pub struct BytesLoader;

impl BytesLoader {
    /// The tag containers use for binary assets.
    pub const TAG: &'static str = "bytes";
}

impl AssetLoader for BytesLoader {
    type Asset = Vec<u8>;

    fn tag(&self) -> &str {
        Self::TAG
    }

    fn load(&self, ctx: LoadContext<'_>) -> impl Future<Output = AssetResult<Vec<u8>>> + Send {
        async move { ctx.container.data() }
    }
}
