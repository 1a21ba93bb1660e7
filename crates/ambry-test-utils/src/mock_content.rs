//! A content manager that records what assets finalize against it.

use std::any::Any;
use std::collections::HashSet;

use ambry_assets::error::{AssetError, AssetResult};
use ambry_assets::finalize::ContentManager;
use parking_lot::Mutex;

/// Records a finalize call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCall {
    /// An asset uploaded its payload.
    Upload {
        /// The asset name.
        name: String,
        /// Payload size in bytes.
        bytes: usize,
    },
    /// An upload was refused because the name was marked with
    /// [`MockContentManager::reject`].
    Rejected {
        /// The asset name.
        name: String,
    },
}

/// Mock host content manager.
///
/// Methods take `&self` and record into a `Mutex`, since finalize hooks only see a
/// shared reference.
#[derive(Debug, Default)]
pub struct MockContentManager {
    calls: Mutex<Vec<ContentCall>>,
    rejected: Mutex<HashSet<String>>,
}

impl MockContentManager {
    /// Create a new mock content manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later upload of `name` fail.
    pub fn reject(&self, name: &str) {
        self.rejected.lock().insert(name.to_string());
    }

    /// Let uploads of `name` succeed again.
    pub fn allow(&self, name: &str) {
        self.rejected.lock().remove(name);
    }

    /// Record an upload, failing if `name` is rejected.
    pub fn upload(&self, name: &str, bytes: usize) -> AssetResult<()> {
        if self.rejected.lock().contains(name) {
            self.calls.lock().push(ContentCall::Rejected {
                name: name.to_string(),
            });
            return Err(AssetError::FinalizeFailed {
                name: name.to_string(),
                message: "upload rejected".to_string(),
            });
        }
        self.calls.lock().push(ContentCall::Upload {
            name: name.to_string(),
            bytes,
        });
        Ok(())
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<ContentCall> {
        self.calls.lock().clone()
    }

    /// Number of successful uploads.
    pub fn count_uploads(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ContentCall::Upload { .. }))
            .count()
    }

    /// Number of successful uploads of `name`.
    pub fn uploads_of(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ContentCall::Upload { name: n, .. } if n == name))
            .count()
    }
}

impl ContentManager for MockContentManager {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
