//! Materialization state of a referenced asset.

use std::fmt;

/// Where a referenced asset is in the loading pipeline.
///
/// The happy path is `NotReady -> PartiallyReady -> Ready`; any state may move to
/// `Unavailable`, which is terminal until a reload succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AssetState {
    /// Requested but not yet loaded. No value is readable.
    #[default]
    NotReady,

    /// Decoded and produced by its loader, but not yet finalized.
    PartiallyReady,

    /// Fully finalized and ready for use.
    Ready,

    /// Loading or finalization failed.
    Unavailable,
}

impl AssetState {
    /// Returns `true` if the asset is ready for use.
    pub fn is_ready(&self) -> bool {
        matches!(self, AssetState::Ready)
    }

    /// Returns `true` if the asset failed to load.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AssetState::Unavailable)
    }

    /// Returns `true` if waiting on this state can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Unavailable)
    }

    /// Returns `true` if a reference in this state must hold a value.
    pub fn requires_value(&self) -> bool {
        matches!(self, AssetState::PartiallyReady | AssetState::Ready)
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetState::NotReady => "not ready",
            AssetState::PartiallyReady => "partially ready",
            AssetState::Ready => "ready",
            AssetState::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// How waiting treats an `Unavailable` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// The asset must become ready; `Unavailable` is an error.
    Required,

    /// The asset may be missing; `Unavailable` ends the wait normally.
    Optional,
}
