//! Core types for the place subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─── Coordinate ─────────────────────────────────────────────────

/// A validated WGS84 coordinate. Both components are finite and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = PlaceError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, PlaceError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(PlaceError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0.0 { 'N' } else { 'S' };
        let ew = if self.lng >= 0.0 { 'E' } else { 'W' };
        write!(f, "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", self.lat.abs(), ns, self.lng.abs(), ew)
    }
}

// ─── Classification ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    HiddenGem,
    TouristTrap,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HiddenGem => write!(f, "Hidden Gem"),
            Self::TouristTrap => write!(f, "Tourist Trap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceType {
    Restaurant,
    Bar,
    Cafe,
    Activity,
    Other,
}

impl fmt::Display for PlaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restaurant => write!(f, "Restaurant"),
            Self::Bar => write!(f, "Bar"),
            Self::Cafe => write!(f, "Cafe"),
            Self::Activity => write!(f, "Activity"),
            Self::Other => write!(f, "Other"),
        }
    }
}

// ─── Tiers ──────────────────────────────────────────────────────

/// Confidence tier of a candidate, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Exact local match against the Saved Set.
    Local,
    /// Structured-knowledge answer that carried its own coordinates.
    Knowledge,
    /// Directory lookup seeded by an extracted postal code.
    PostalCode,
    /// Directory lookup seeded by the answer's address.
    Address,
    /// Directory lookup seeded by the answer's name.
    Name,
    /// Directory lookup on the raw query.
    Fallback,
    /// Produced outside the text pipeline (map click, discovery, suggestion).
    Direct,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "0"),
            Self::Knowledge => write!(f, "1"),
            Self::PostalCode => write!(f, "1a"),
            Self::Address => write!(f, "1b"),
            Self::Name => write!(f, "1c"),
            Self::Fallback => write!(f, "2"),
            Self::Direct => write!(f, "-"),
        }
    }
}

// ─── Place & Candidate ──────────────────────────────────────────

/// A persisted, located point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub description: String,
    pub category: Category,
    pub place_type: PlaceType,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl Place {
    pub fn display_line(&self) -> String {
        let visited = if self.visited.unwrap_or(false) { " \u{2713}" } else { "" };
        format!(
            "{} [{} \u{00B7} {}]{}\n  {}\n  {}",
            self.name,
            self.place_type,
            self.category,
            visited,
            self.address.as_deref().unwrap_or(&self.description),
            self.coordinate,
        )
    }
}

/// A transient, not-yet-saved resolution output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub description: String,
    pub category: Category,
    pub place_type: PlaceType,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub tier: Tier,
}

impl Candidate {
    /// Promote to a persistent Place. Saved places start unvisited and unrated.
    pub fn into_place(self) -> Place {
        Place {
            id: self.id,
            name: self.name,
            coordinate: self.coordinate,
            description: self.description,
            category: self.category,
            place_type: self.place_type,
            image: self.image,
            address: self.address,
            visited: Some(false),
            rating: None,
        }
    }

    /// Wrap an already-saved Place as a tier-0 candidate.
    pub fn from_saved(place: &Place) -> Self {
        Self {
            id: place.id.clone(),
            name: place.name.clone(),
            coordinate: place.coordinate,
            description: place.description.clone(),
            category: place.category,
            place_type: place.place_type,
            image: place.image.clone(),
            address: place.address.clone(),
            tier: Tier::Local,
        }
    }

    pub fn display_line(&self) -> String {
        format!(
            "{} [{} \u{00B7} {}] (tier {})\n  {}\n  {}",
            self.name,
            self.place_type,
            self.category,
            self.tier,
            self.address.as_deref().unwrap_or(&self.description),
            self.coordinate,
        )
    }
}

/// Stable id for a remotely located candidate.
///
/// Same source, name and coordinate give the same id. Two places sharing a
/// building (one postal code, one coordinate) still get distinct ids.
pub fn candidate_id(source: &str, name: &str, coordinate: &Coordinate) -> String {
    format!(
        "{}-{}-{:.6}-{:.6}",
        source,
        slug(name),
        coordinate.lat(),
        coordinate.lng()
    )
}

fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

// ─── Resolution outcome ─────────────────────────────────────────

/// A user-visible signal raised while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum Notice {
    /// A quota-limited service refused the request. Shown verbatim.
    RateLimited(String),
    NotFound(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            Self::NotFound(q) => write!(f, "Place not found: '{}'", q),
        }
    }
}

/// Terminal outcome of one text resolution cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Found {
        candidate: Candidate,
        notices: Vec<Notice>,
    },
    NotFound {
        query: String,
        notices: Vec<Notice>,
    },
}

impl Resolution {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Self::Found { candidate, .. } => Some(candidate),
            Self::NotFound { .. } => None,
        }
    }

    pub fn notices(&self) -> &[Notice] {
        match self {
            Self::Found { notices, .. } | Self::NotFound { notices, .. } => notices,
        }
    }
}

/// Lifecycle of the current search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionState {
    Idle,
    Searching,
    Found,
    NotFound,
}

// ─── Errors ─────────────────────────────────────────────────────

/// One problem found while validating a remote payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub problem: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Query is empty")]
    EmptyQuery,
    #[error("Invalid coordinate ({lat}, {lng}). Lat: -90..90, Lng: -180..180")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
    #[error("Invalid fields: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("Place not found: '{0}'")]
    NotFound(String),
    #[error("A place with id '{0}' is already saved")]
    DuplicateId(String),
    #[error("No saved place with id '{0}'")]
    UnknownId(String),
    #[error("Position {0} is out of range")]
    OutOfRange(usize),
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("No search result to save")]
    NothingToSave,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
