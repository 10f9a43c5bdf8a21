//! Shared state: the user's Saved Set and the temporary search result.
//!
//! The Saved Set has one writer at a time and every mutation swaps in a
//! whole new collection, so readers holding a snapshot never see a partial
//! update. The result slot is guarded by a generation token: only the
//! response for the most recently started resolution is applied.

use super::types::{Candidate, Place, PlaceError, Resolution, ResolutionState, Tier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

// ─── Saved Set ──────────────────────────────────────────────────

#[derive(Default)]
pub struct SavedSet {
    places: RwLock<Arc<Vec<Place>>>,
}

impl SavedSet {
    /// Build from existing places. Later duplicates of an id are dropped.
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places: RwLock::new(Arc::new(dedupe_ids(places))),
        }
    }

    /// A consistent view of the collection, in user order.
    pub fn snapshot(&self) -> Arc<Vec<Place>> {
        let guard = self.places.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Place> {
        self.snapshot().iter().find(|p| p.id == id).cloned()
    }

    /// Copy, mutate, swap. The write lock is held for the whole cycle.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut Vec<Place>) -> Result<T, PlaceError>,
    ) -> Result<T, PlaceError> {
        let mut guard = self.places.write().unwrap_or_else(|e| e.into_inner());
        let mut next: Vec<Place> = guard.as_slice().to_vec();
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }

    pub fn add(&self, place: Place) -> Result<(), PlaceError> {
        self.update(|places| {
            if places.iter().any(|p| p.id == place.id) {
                return Err(PlaceError::DuplicateId(place.id.clone()));
            }
            info!(id = %place.id, name = %place.name, "place saved");
            places.push(place);
            Ok(())
        })
    }

    pub fn remove(&self, id: &str) -> Result<Place, PlaceError> {
        self.update(|places| {
            let idx = position(places, id)?;
            Ok(places.remove(idx))
        })
    }

    /// Move the place at `from` so it ends up at `to`.
    pub fn reorder(&self, from: usize, to: usize) -> Result<(), PlaceError> {
        self.update(|places| {
            if from >= places.len() {
                return Err(PlaceError::OutOfRange(from));
            }
            if to >= places.len() {
                return Err(PlaceError::OutOfRange(to));
            }
            let place = places.remove(from);
            places.insert(to, place);
            Ok(())
        })
    }

    /// Flip the visited flag, returning the new value.
    pub fn toggle_visited(&self, id: &str) -> Result<bool, PlaceError> {
        self.update(|places| {
            let idx = position(places, id)?;
            let visited = !places[idx].visited.unwrap_or(false);
            places[idx].visited = Some(visited);
            Ok(visited)
        })
    }

    pub fn set_rating(&self, id: &str, rating: Option<u8>) -> Result<(), PlaceError> {
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(PlaceError::InvalidRating(r));
            }
        }
        self.update(|places| {
            let idx = position(places, id)?;
            places[idx].rating = rating;
            Ok(())
        })
    }

    pub fn replace_all(&self, places: Vec<Place>) {
        let mut guard = self.places.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(dedupe_ids(places));
    }
}

fn position(places: &[Place], id: &str) -> Result<usize, PlaceError> {
    places
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| PlaceError::UnknownId(id.to_string()))
}

fn dedupe_ids(places: Vec<Place>) -> Vec<Place> {
    let mut seen = std::collections::HashSet::new();
    places.into_iter().filter(|p| seen.insert(p.id.clone())).collect()
}

// ─── Result slot ────────────────────────────────────────────────

/// Ticket for one resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

struct SlotInner {
    state: ResolutionState,
    resolution: Option<Resolution>,
}

/// The singleton "current search result".
pub struct ResultSlot {
    latest: AtomicU64,
    inner: Mutex<SlotInner>,
}

impl Default for ResultSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSlot {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            inner: Mutex::new(SlotInner {
                state: ResolutionState::Idle,
                resolution: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new cycle. Any response still in flight becomes stale.
    pub fn begin(&self) -> Generation {
        let mut inner = self.lock();
        let generation = Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
        inner.state = ResolutionState::Searching;
        inner.resolution = None;
        generation
    }

    /// Apply a finished resolution. Returns false if a newer cycle started.
    pub fn apply(&self, generation: Generation, resolution: Resolution) -> bool {
        let mut inner = self.lock();
        let latest = self.latest.load(Ordering::SeqCst);
        if generation.0 != latest {
            debug!(stale = generation.0, latest, "discarding stale resolution");
            return false;
        }
        inner.state = match resolution {
            Resolution::Found { .. } => ResolutionState::Found,
            Resolution::NotFound { .. } => ResolutionState::NotFound,
        };
        inner.resolution = Some(resolution);
        true
    }

    /// Show a candidate produced outside the text pipeline (map click, suggestion).
    pub fn show(&self, candidate: Candidate) {
        let generation = self.begin();
        self.apply(
            generation,
            Resolution::Found {
                candidate,
                notices: Vec::new(),
            },
        );
    }

    pub fn state(&self) -> ResolutionState {
        self.lock().state
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.lock().resolution.clone()
    }

    pub fn current(&self) -> Option<Candidate> {
        self.lock()
            .resolution
            .as_ref()
            .and_then(|r| r.candidate().cloned())
    }

    /// Close the result view. In-flight responses are discarded.
    pub fn clear(&self) {
        let mut inner = self.lock();
        self.latest.fetch_add(1, Ordering::SeqCst);
        inner.state = ResolutionState::Idle;
        inner.resolution = None;
    }

    /// Save the current candidate and clear the slot.
    ///
    /// A local match, or a re-run of a query whose result was already saved,
    /// returns the saved place as-is. Any other id clash is an error.
    pub fn promote(&self, saved: &SavedSet) -> Result<Place, PlaceError> {
        let candidate = self.current().ok_or(PlaceError::NothingToSave)?;
        let place = match saved.get(&candidate.id) {
            Some(existing) if candidate.tier == Tier::Local || existing.name == candidate.name => {
                existing
            }
            _ => {
                let place = candidate.into_place();
                saved.add(place.clone())?;
                place
            }
        };
        self.clear();
        Ok(place)
    }
}
