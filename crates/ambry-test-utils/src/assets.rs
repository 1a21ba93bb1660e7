//! Test asset types, loaders and container builders.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ambry_assets::Asset;
use ambry_assets::container::{DATA_PROPERTY, WritableContainer};
use ambry_assets::error::AssetResult;
use ambry_assets::finalize::FinalizeContext;
use ambry_assets::loader::{AssetLoader, LoadContext, TextLoader};

use crate::mock_content::MockContentManager;

/// Property that makes [`TextureLoader`] fail with its contents as the message.
pub const FAIL_PROPERTY: &str = "Fail";

/// An asset that must be uploaded on the scheduler thread before it is ready.
#[derive(Debug)]
pub struct Texture {
    /// Asset name, used when uploading.
    pub name: String,
    /// Pixel payload.
    pub pixels: Vec<u8>,
    /// Names listed in the container's dependency section.
    pub dependencies: Vec<String>,
    uploaded: AtomicBool,
    released: Arc<AtomicBool>,
}

impl Texture {
    /// Returns `true` once finalization uploaded the pixels.
    pub fn is_uploaded(&self) -> bool {
        self.uploaded.load(Ordering::SeqCst)
    }

    /// Returns `true` once a reload replaced this value.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Asset for Texture {
    fn type_name() -> &'static str {
        "Texture"
    }

    fn requires_finalization(&self) -> bool {
        true
    }

    fn finalize(&self, ctx: &FinalizeContext) -> AssetResult<()> {
        let content = ctx.content_manager::<MockContentManager>()?;
        content.upload(&self.name, self.pixels.len())?;
        self.uploaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Loads [`Texture`]s from the `Data` property; tag `texture`.
pub struct TextureLoader;

impl TextureLoader {
    /// The tag texture containers use.
    pub const TAG: &'static str = "texture";
}

impl AssetLoader for TextureLoader {
    type Asset = Texture;

    fn tag(&self) -> &str {
        Self::TAG
    }

    fn load(&self, ctx: LoadContext<'_>) -> impl Future<Output = AssetResult<Texture>> + Send {
        async move {
            if ctx.container.has_property(FAIL_PROPERTY) {
                return Err(ctx.error(ctx.container.get_string(FAIL_PROPERTY)?));
            }
            Ok(Texture {
                name: ctx.name.to_string(),
                pixels: ctx.container.get_byte_array(DATA_PROPERTY)?,
                dependencies: ctx.container.dependencies().to_vec(),
                uploaded: AtomicBool::new(false),
                released: Arc::new(AtomicBool::new(false)),
            })
        }
    }
}

/// Wraps a loader and counts how many loads it started.
pub struct CountingLoader<L> {
    inner: L,
    loads: Arc<AtomicUsize>,
}

impl<L: AssetLoader> CountingLoader<L> {
    /// Wrap `inner`; returns the loader and its shared counter.
    pub fn new(inner: L) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                loads: loads.clone(),
            },
            loads,
        )
    }
}

impl<L: AssetLoader> AssetLoader for CountingLoader<L> {
    type Asset = L::Asset;

    fn tag(&self) -> &str {
        self.inner.tag()
    }

    fn load(&self, ctx: LoadContext<'_>) -> impl Future<Output = AssetResult<L::Asset>> + Send {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(ctx)
    }
}

/// A text container for [`TextLoader`].
pub fn text_container(body: &str) -> WritableContainer {
    let mut container = WritableContainer::new();
    container.set_loader(TextLoader::TAG);
    container.set_data(body.as_bytes().to_vec());
    container
}

/// A texture container for [`TextureLoader`].
pub fn texture_container(pixels: &[u8]) -> WritableContainer {
    let mut container = WritableContainer::new();
    container.set_loader(TextureLoader::TAG);
    container.set_data(pixels.to_vec());
    container
}

/// A texture container that [`TextureLoader`] refuses with `message`.
pub fn failing_texture_container(message: &str) -> WritableContainer {
    let mut container = WritableContainer::new();
    container.set_loader(TextureLoader::TAG);
    container.set_string(FAIL_PROPERTY, message);
    container
}
