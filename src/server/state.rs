use crate::place::{PlaceError, PlaceResolver, PlaceStore, ResultSlot, SavedSet, SuggestedSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct AppState {
    pub resolver: PlaceResolver,
    /// The single "current search result".
    pub current: ResultSlot,
    /// Latest viewport discovery results.
    pub suggested: SuggestedSet,
    store: Option<Mutex<PlaceStore>>,
}

impl AppState {
    pub fn new(resolver: PlaceResolver, store: Option<PlaceStore>) -> Self {
        Self {
            resolver,
            current: ResultSlot::new(),
            suggested: SuggestedSet::default(),
            store: store.map(Mutex::new),
        }
    }

    pub fn saved(&self) -> &Arc<SavedSet> {
        self.resolver.saved()
    }

    /// Write the Saved Set back to disk, if this server has a store.
    pub fn persist(&self) -> Result<(), PlaceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        store.save_set(self.saved())?;
        debug!(path = %store.path().display(), count = self.saved().len(), "saved places written");
        Ok(())
    }
}
