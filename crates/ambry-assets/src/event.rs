//! Asset events for change detection.

use std::sync::Arc;

use crate::error::AssetError;

/// Events recorded by the asset manager's finalization step.
#[derive(Debug, Clone)]
pub enum AssetEvent {
    /// An asset became ready for the first time.
    Ready {
        /// The asset name.
        name: String,
        /// The reference's version after the swap.
        version: u32,
    },

    /// A ready asset was replaced by a reloaded value.
    Reloaded {
        /// The asset name.
        name: String,
        /// The reference's version after the swap.
        version: u32,
    },

    /// An asset became unavailable.
    Failed {
        /// The asset name.
        name: String,
        /// The recorded error.
        error: Arc<AssetError>,
    },

    /// A reload of a ready asset failed; the previous value was kept.
    ReloadDiscarded {
        /// The asset name.
        name: String,
        /// The discarded error.
        error: Arc<AssetError>,
    },
}

impl AssetEvent {
    /// The name of the asset this event relates to.
    pub fn name(&self) -> &str {
        match self {
            AssetEvent::Ready { name, .. }
            | AssetEvent::Reloaded { name, .. }
            | AssetEvent::Failed { name, .. }
            | AssetEvent::ReloadDiscarded { name, .. } => name,
        }
    }

    /// Check if this is a first-time ready event.
    pub fn is_ready(&self) -> bool {
        matches!(self, AssetEvent::Ready { .. })
    }

    /// Check if this is a successful reload event.
    pub fn is_reloaded(&self) -> bool {
        matches!(self, AssetEvent::Reloaded { .. })
    }

    /// Check if this is a failure event, discarded or not.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AssetEvent::Failed { .. } | AssetEvent::ReloadDiscarded { .. }
        )
    }
}

/// A buffer of asset events that can be drained each tick.
#[derive(Debug, Default)]
pub struct AssetEventBuffer {
    events: Vec<AssetEvent>,
}

impl AssetEventBuffer {
    /// Create a new empty event buffer.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event to the buffer.
    pub fn push(&mut self, event: AssetEvent) {
        self.events.push(event);
    }

    /// Take every buffered event, oldest first.
    pub fn take(&mut self) -> Vec<AssetEvent> {
        std::mem::take(&mut self.events)
    }

    /// Check if there are any events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}
