//! Error types for the asset pipeline.

use std::fmt;
use std::sync::Arc;

/// Errors that can occur while decoding, loading or finalizing assets.
#[derive(Debug)]
pub enum AssetError {
    /// The compiled-asset filesystem has no entry for this name.
    NotFound {
        /// The requested asset name.
        name: String,
    },

    /// Reading from the underlying byte stream failed.
    Io {
        /// The asset being read, empty when unknown.
        name: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// No loader is registered for the tag declared by the container.
    NoLoader {
        /// The loader tag found in the container.
        tag: String,
    },

    /// The container index has no entry with this property name.
    MissingProperty {
        /// The requested property.
        property: String,
    },

    /// The container was opened in dependency-only mode and has no property index.
    DependenciesOnly,

    /// The container bytes are malformed or truncated.
    Decode {
        /// Description of what could not be decoded.
        message: String,
    },

    /// The loader failed to turn the container into an asset.
    LoaderFailed {
        /// The asset being loaded.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The asset (or the reference it was requested through) has a different type.
    TypeMismatch {
        /// The asset name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type already associated with the name.
        actual: &'static str,
    },

    /// Finalizing the asset on the owning thread failed.
    FinalizeFailed {
        /// The asset being finalized.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The host has no content manager, so there is nothing to finalize against.
    ///
    /// The manager treats this as a successful finalization.
    NoContentManager,

    /// A reference was asked to enter a state that contradicts its contents.
    InvalidTransition {
        /// The asset name.
        name: String,
        /// Description of the rejected transition.
        reason: &'static str,
    },

    /// The asset is in the terminal `Unavailable` state.
    Unavailable {
        /// The asset name.
        name: String,
        /// The error recorded when the asset became unavailable.
        source: Arc<AssetError>,
    },

    /// A loader waited on an asset that was still loading.
    ///
    /// Loads run one at a time on the loader thread, so such a wait could never end.
    WaitOnLoaderThread,

    /// Every entry of a preference list is unavailable.
    AllUnavailable {
        /// The recorded error of each entry, in preference order.
        errors: Vec<Arc<AssetError>>,
    },
}

impl AssetError {
    /// Build a [`AssetError::Decode`] from anything printable.
    pub fn decode(message: impl Into<String>) -> Self {
        AssetError::Decode {
            message: message.into(),
        }
    }

    /// Returns `true` for the "nothing to finalize against" case.
    pub fn is_no_content_manager(&self) -> bool {
        matches!(self, AssetError::NoContentManager)
    }

    /// Attach an asset name to an IO error that was raised without one.
    pub(crate) fn with_name(self, name: &str) -> Self {
        match self {
            AssetError::Io { name: n, source } if n.is_empty() => AssetError::Io {
                name: name.to_string(),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { name } => write!(f, "Asset not found: {}", name),
            AssetError::Io { name, source } if name.is_empty() => {
                write!(f, "IO error: {}", source)
            }
            AssetError::Io { name, source } => {
                write!(f, "IO error reading '{}': {}", name, source)
            }
            AssetError::NoLoader { tag } => {
                write!(f, "No loader registered for tag '{}'", tag)
            }
            AssetError::MissingProperty { property } => {
                write!(f, "Container has no property named '{}'", property)
            }
            AssetError::DependenciesOnly => {
                write!(f, "Container was read with dependency information only")
            }
            AssetError::Decode { message } => write!(f, "Malformed container: {}", message),
            AssetError::LoaderFailed { name, message } => {
                write!(f, "Failed to load '{}': {}", name, message)
            }
            AssetError::TypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Type mismatch for '{}': requested {}, tracked as {}",
                name, expected, actual
            ),
            AssetError::FinalizeFailed { name, message } => {
                write!(f, "Failed to finalize '{}': {}", name, message)
            }
            AssetError::NoContentManager => write!(f, "No content manager is configured"),
            AssetError::InvalidTransition { name, reason } => {
                write!(f, "Invalid state transition for '{}': {}", name, reason)
            }
            AssetError::Unavailable { name, source } => {
                write!(f, "Asset '{}' is unavailable: {}", name, source)
            }
            AssetError::WaitOnLoaderThread => {
                write!(f, "Cannot wait for a loading asset from inside a loader")
            }
            AssetError::AllUnavailable { errors } => {
                write!(f, "All {} preferred assets are unavailable", errors.len())?;
                for error in errors {
                    write!(f, "; {}", error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            AssetError::Unavailable { source, .. } => Some(source.as_ref()),
            AssetError::AllUnavailable { errors } => errors
                .first()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return AssetError::decode("unexpected end of stream");
        }
        AssetError::Io {
            name: String::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
