//! A single reference over an ordered list of fallbacks.

use std::fmt;
use std::sync::Arc;

use crate::Asset;
use crate::error::{AssetError, AssetResult};
use crate::reference::{AssetRef, AssetReference};
use crate::state::AssetState;

/// Presents several references as one, preferring earlier entries.
///
/// Unavailable entries are skipped; the first entry that is not unavailable decides the
/// aggregate. An earlier entry that is still loading therefore hides a later entry that
/// is already ready. An empty list is unavailable.
pub struct PreferenceListReference<T> {
    entries: Vec<AssetReference<T>>,
}

impl<T> Clone for PreferenceListReference<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> fmt::Debug for PreferenceListReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<T: Asset> PreferenceListReference<T> {
    /// Wrap references, most preferred first.
    pub fn new(entries: Vec<AssetReference<T>>) -> Self {
        Self { entries }
    }

    /// The underlying references in preference order.
    pub fn entries(&self) -> &[AssetReference<T>] {
        &self.entries
    }

    /// The first entry that is not unavailable.
    pub fn selected(&self) -> Option<&AssetReference<T>> {
        self.entries
            .iter()
            .find(|entry| entry.state() != AssetState::Unavailable)
    }

    /// The aggregate state.
    pub fn state(&self) -> AssetState {
        match self.selected().map(AssetReference::state) {
            Some(AssetState::Ready) => AssetState::Ready,
            Some(_) => AssetState::NotReady,
            None => AssetState::Unavailable,
        }
    }

    /// Returns `true` if the aggregate state is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The selected entry's value once it is ready.
    ///
    /// Fails with [`AssetError::AllUnavailable`] when every entry is unavailable.
    pub fn asset(&self) -> AssetResult<Option<Arc<T>>> {
        let mut errors = Vec::new();
        for entry in &self.entries {
            let snapshot = entry.snapshot();
            match snapshot.state {
                AssetState::Unavailable => errors.extend(snapshot.error),
                AssetState::Ready => return Ok(snapshot.asset),
                AssetState::NotReady | AssetState::PartiallyReady => return Ok(None),
            }
        }
        Err(AssetError::AllUnavailable { errors })
    }

    fn all_errors(&self) -> Vec<Arc<AssetError>> {
        self.entries
            .iter()
            .filter_map(AssetReference::loading_error)
            .collect()
    }
}

impl<T: Asset> AssetRef<T> for PreferenceListReference<T> {
    fn state(&self) -> AssetState {
        PreferenceListReference::state(self)
    }

    fn asset(&self) -> AssetResult<Option<Arc<T>>> {
        PreferenceListReference::asset(self)
    }

    fn unavailable_error(&self) -> AssetError {
        AssetError::AllUnavailable {
            errors: self.all_errors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    fn failed(name: &str) -> AssetReference<String> {
        let reference = AssetReference::new(name);
        reference.fail(Arc::new(AssetError::NotFound {
            name: name.to_string(),
        }));
        reference
    }

    fn ready(name: &str, value: &str) -> AssetReference<String> {
        let reference = AssetReference::new(name);
        promote(&reference, value);
        reference
    }

    fn promote(reference: &AssetReference<String>, value: &str) {
        let value = Arc::new(value.to_string());
        let (ticket, _) = reference.update_unless_ready(value.clone());
        reference.update(value, AssetState::Ready, ticket).unwrap();
    }

    #[test]
    fn test_loading_entry_hides_later_ready_entry() {
        let pending = AssetReference::<String>::new("text.Hd");
        let list = PreferenceListReference::new(vec![
            failed("text.Uhd"),
            pending.clone(),
            ready("text.Sd", "sd"),
        ]);

        assert_eq!(list.state(), AssetState::NotReady);
        assert!(list.asset().unwrap().is_none());

        promote(&pending, "hd");
        assert_eq!(list.state(), AssetState::Ready);
        assert_eq!(list.asset().unwrap().unwrap().as_str(), "hd");
        assert!(list.selected().unwrap().ptr_eq(&pending));
    }

    #[test]
    fn test_partially_ready_counts_as_not_ready() {
        let partial = AssetReference::<String>::new("text.A");
        partial.update_unless_ready(Arc::new("a".to_string()));
        let list = PreferenceListReference::new(vec![partial]);
        assert_eq!(list.state(), AssetState::NotReady);
        assert!(list.asset().unwrap().is_none());
    }

    #[test]
    fn test_all_unavailable_combines_errors() {
        let list = PreferenceListReference::new(vec![failed("text.A"), failed("text.B")]);
        assert_eq!(list.state(), AssetState::Unavailable);
        match list.asset() {
            Err(AssetError::AllUnavailable { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected AllUnavailable, got {:?}", other),
        }
        assert!(!block_on(list.wait_until_ready_optional()));
        assert!(block_on(list.wait_until_ready()).is_err());
    }

    #[test]
    fn test_empty_list_is_unavailable() {
        let list = PreferenceListReference::<String>::new(Vec::new());
        assert_eq!(list.state(), AssetState::Unavailable);
        assert!(list.asset().is_err());
    }
}
