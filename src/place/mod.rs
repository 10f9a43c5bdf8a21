//! Place resolution subsystem.
//!
//! Turns free text, map clicks and viewport searches into located
//! candidates, and keeps the user's Saved Set.

pub mod discovery;
pub mod normalize;
pub mod providers;
pub mod resolver;
pub mod saved;
pub mod store;
pub mod suggest;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::{discover, SuggestedSet};
pub use normalize::{PostalCodeHint, PrecisionHint};
pub use providers::{BoundingBox, Services};
pub use resolver::PlaceResolver;
pub use saved::{ResultSlot, SavedSet};
pub use store::PlaceStore;
pub use suggest::{suggest, Suggestion, SuggestionSession, SuggestionState};
pub use types::{Candidate, Category, Coordinate, Notice, Place, PlaceError, PlaceType, Resolution, Tier};
