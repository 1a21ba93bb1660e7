//! Host context handed to finalize hooks.

use std::any::Any;
use std::sync::Arc;

use crate::error::{AssetError, AssetResult};

/// A host-side resource owner that assets finalize against (a GPU device, an audio
/// mixer).
///
/// Finalization runs on the scheduler thread, so implementations need not be `Sync`
/// beyond what sharing the `Arc` requires.
pub trait ContentManager: Send + Sync + 'static {
    /// Access the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// What an [`Asset::finalize`](crate::Asset::finalize) hook can reach.
#[derive(Clone, Default)]
pub struct FinalizeContext {
    name: String,
    content_manager: Option<Arc<dyn ContentManager>>,
}

impl FinalizeContext {
    pub(crate) fn new(name: &str, content_manager: Option<Arc<dyn ContentManager>>) -> Self {
        Self {
            name: name.to_string(),
            content_manager,
        }
    }

    /// The name of the asset being finalized.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the host configured a content manager.
    pub fn has_content_manager(&self) -> bool {
        self.content_manager.is_some()
    }

    /// The host's content manager as its concrete type.
    ///
    /// Fails with [`AssetError::NoContentManager`] when none is configured, which the
    /// manager treats as a successful finalization; a hook can simply use `?`.
    pub fn content_manager<C: ContentManager>(&self) -> AssetResult<&C> {
        let manager = self
            .content_manager
            .as_deref()
            .ok_or(AssetError::NoContentManager)?;
        manager
            .as_any()
            .downcast_ref::<C>()
            .ok_or_else(|| AssetError::FinalizeFailed {
                name: self.name.clone(),
                message: format!(
                    "content manager is not a {}",
                    std::any::type_name::<C>()
                ),
            })
    }
}

impl std::fmt::Debug for FinalizeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizeContext")
            .field("name", &self.name)
            .field("content_manager", &self.content_manager.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Device;

    impl ContentManager for Device {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Mixer;

    impl ContentManager for Mixer {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_missing_content_manager() {
        let ctx = FinalizeContext::new("texture.A", None);
        assert!(matches!(
            ctx.content_manager::<Device>(),
            Err(AssetError::NoContentManager)
        ));
    }

    #[test]
    fn test_content_manager_downcast() {
        let ctx = FinalizeContext::new("texture.A", Some(Arc::new(Device)));
        assert!(ctx.content_manager::<Device>().is_ok());
        assert!(matches!(
            ctx.content_manager::<Mixer>(),
            Err(AssetError::FinalizeFailed { .. })
        ));
    }
}
