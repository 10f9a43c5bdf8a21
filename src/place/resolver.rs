//! Place resolver: orchestrates the tiered fallback chain.
//!
//! Text flow:  Saved Set (0) → structured knowledge (1) → directory on the
//!             answer (1a postal code / 1b address / 1c name) → directory on
//!             the raw query (2) → not found
//! Click flow: reverse lookup → placeholder name
//!
//! Every tier is tried at most once, in order, and the first one that yields
//! a coordinate wins. A failing tier contributes nothing to later ones.

use super::normalize::{
    directory_seed, image_for, normalize_query, pick_name, place_type_from_amenity,
    place_type_from_tags, PostalCodeHint, PrecisionHint, REVERSE_NAME_ORDER,
    SUGGESTION_NAME_ORDER, UNKNOWN_LOCATION,
};
use super::providers::{DirectoryHit, DirectoryService, KnowledgeService, Services};
use super::saved::{ResultSlot, SavedSet};
use super::types::{
    candidate_id, Candidate, Category, Coordinate, Notice, Place, PlaceError, PlaceType,
    Resolution, Tier,
};
use crate::config::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ─── Resolver capability ────────────────────────────────────────

/// Why a tier produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// The lookup ran and found nothing.
    Empty,
    /// Transport error, malformed body, or schema mismatch.
    Soft(String),
    /// Quota refusal. Surfaced to the user, never retried.
    RateLimited(String),
}

impl From<PlaceError> for Miss {
    fn from(err: PlaceError) -> Self {
        match err {
            PlaceError::RateLimited(msg) => Miss::RateLimited(msg),
            PlaceError::NotFound(_) => Miss::Empty,
            other => Miss::Soft(other.to_string()),
        }
    }
}

pub type Attempt = Result<Candidate, Miss>;

/// What every tier sees: the normalized text and a Saved Set snapshot.
pub struct Query<'a> {
    pub text: &'a str,
    pub saved: &'a [Place],
}

/// One lookup strategy.
pub trait Resolver: Send + Sync {
    fn label(&self) -> &'static str;

    fn attempt(&self, query: &Query<'_>) -> Attempt;
}

// ─── Tier 0: local match ────────────────────────────────────────

/// First saved place whose name contains the query, case-insensitively.
pub struct LocalMatch;

impl Resolver for LocalMatch {
    fn label(&self) -> &'static str {
        "local"
    }

    fn attempt(&self, query: &Query<'_>) -> Attempt {
        let needle = query.text.to_lowercase();
        query
            .saved
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
            .map(Candidate::from_saved)
            .ok_or(Miss::Empty)
    }
}

// ─── Tier 1: structured knowledge + directory ───────────────────

pub struct KnowledgeLookup {
    knowledge: Arc<dyn KnowledgeService>,
    directory: Arc<dyn DirectoryService>,
    hint: Box<dyn PrecisionHint>,
    region: String,
    min_seed_len: usize,
    limit: usize,
    image_base: String,
}

impl KnowledgeLookup {
    pub fn new(services: &Services, hint: Box<dyn PrecisionHint>, config: &Config) -> Self {
        Self {
            knowledge: Arc::clone(&services.knowledge),
            directory: Arc::clone(&services.directory),
            hint,
            region: config.region.clone(),
            min_seed_len: config.min_seed_len,
            limit: config.directory_limit,
            image_base: config.image_base.clone(),
        }
    }
}

impl Resolver for KnowledgeLookup {
    fn label(&self) -> &'static str {
        "knowledge"
    }

    fn attempt(&self, query: &Query<'_>) -> Attempt {
        let answer = self.knowledge.ask(query.text)?;

        if let Some(coordinate) = answer.coordinate {
            return Ok(Candidate {
                id: candidate_id("knowledge", &answer.name, &coordinate),
                name: answer.name,
                coordinate,
                description: answer.description,
                category: answer.category,
                place_type: answer.place_type,
                image: image_for(&self.image_base, answer.place_type),
                address: answer.address,
                tier: Tier::Knowledge,
            });
        }

        let (tier, seed) = directory_seed(
            self.hint.as_ref(),
            &answer.name,
            answer.address.as_deref(),
            &self.region,
            self.min_seed_len,
        );
        debug!(tier = %tier, %seed, "answer has no coordinates, geocoding");

        let hit = self
            .directory
            .search(&seed, self.limit)?
            .into_iter()
            .next()
            .ok_or(Miss::Empty)?;

        Ok(Candidate {
            id: candidate_id("geocoded", &answer.name, &hit.coordinate),
            name: answer.name,
            coordinate: hit.coordinate,
            description: answer.description,
            category: answer.category,
            place_type: answer.place_type,
            image: image_for(&self.image_base, answer.place_type),
            address: answer.address.or(Some(hit.label).filter(|l| !l.is_empty())),
            tier,
        })
    }
}

// ─── Tier 2: generic directory fallback ─────────────────────────

pub struct DirectoryFallback {
    directory: Arc<dyn DirectoryService>,
    region: String,
    limit: usize,
    image_base: String,
}

impl DirectoryFallback {
    pub fn new(services: &Services, config: &Config) -> Self {
        Self {
            directory: Arc::clone(&services.directory),
            region: config.region.clone(),
            limit: config.directory_limit,
            image_base: config.image_base.clone(),
        }
    }
}

impl Resolver for DirectoryFallback {
    fn label(&self) -> &'static str {
        "fallback"
    }

    fn attempt(&self, query: &Query<'_>) -> Attempt {
        let q = format!("{} {}", query.text, self.region);
        let hit = self
            .directory
            .search(&q, self.limit)?
            .into_iter()
            .next()
            .ok_or(Miss::Empty)?;
        Ok(candidate_from_hit(hit, query.text, Tier::Fallback, &self.image_base))
    }
}

// ─── Hit → candidate ────────────────────────────────────────────

fn osm_place_type(class: Option<&str>, kind: Option<&str>) -> PlaceType {
    match (class, kind) {
        (Some(class), Some(kind)) => {
            let tags = BTreeMap::from([(class.to_string(), kind.to_string())]);
            place_type_from_tags(&tags)
        }
        _ => PlaceType::Other,
    }
}

/// Synthesize a candidate straight from a directory hit.
///
/// Name preference: amenity, building, shop, tourism, then the first part of
/// the label, then `fallback_name`.
pub fn candidate_from_hit(
    hit: DirectoryHit,
    fallback_name: &str,
    tier: Tier,
    image_base: &str,
) -> Candidate {
    let name = pick_name(&hit.address, SUGGESTION_NAME_ORDER)
        .map(String::from)
        .or_else(|| {
            hit.label
                .split(',')
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| fallback_name.to_string());
    let place_type = osm_place_type(hit.class.as_deref(), hit.kind.as_deref());
    let address = Some(hit.label.clone()).filter(|l| !l.is_empty());

    Candidate {
        id: candidate_id("osm", &name, &hit.coordinate),
        name,
        coordinate: hit.coordinate,
        description: hit.label,
        category: Category::HiddenGem,
        place_type,
        image: image_for(image_base, place_type),
        address,
        tier,
    }
}

// ─── Orchestrator ───────────────────────────────────────────────

/// The resolver with its fallback pipeline.
pub struct PlaceResolver {
    config: Config,
    services: Services,
    saved: Arc<SavedSet>,
    tiers: Vec<Box<dyn Resolver>>,
}

impl PlaceResolver {
    pub fn new(config: Config, services: Services, saved: Arc<SavedSet>) -> Result<Self, PlaceError> {
        let hint = Box::new(PostalCodeHint::new(&config.postal_code_pattern)?);
        Ok(Self::with_hint(config, services, saved, hint))
    }

    /// Build with a different locale's precision hint.
    pub fn with_hint(
        config: Config,
        services: Services,
        saved: Arc<SavedSet>,
        hint: Box<dyn PrecisionHint>,
    ) -> Self {
        let tiers: Vec<Box<dyn Resolver>> = vec![
            Box::new(LocalMatch),
            Box::new(KnowledgeLookup::new(&services, hint, &config)),
            Box::new(DirectoryFallback::new(&services, &config)),
        ];
        Self {
            config,
            services,
            saved,
            tiers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn saved(&self) -> &Arc<SavedSet> {
        &self.saved
    }

    /// Resolve free text through the tier chain.
    ///
    /// Only an empty query is an error; every adapter failure is absorbed
    /// and the terminal outcome is `Resolution::NotFound`.
    pub fn resolve(&self, raw: &str) -> Result<Resolution, PlaceError> {
        let text = normalize_query(raw)?;
        let snapshot = self.saved.snapshot();
        let query = Query {
            text: &text,
            saved: &snapshot,
        };
        let mut notices = Vec::new();

        for tier in &self.tiers {
            match tier.attempt(&query) {
                Ok(candidate) => {
                    info!(query = %text, resolver = tier.label(), tier = %candidate.tier, name = %candidate.name, "resolved");
                    return Ok(Resolution::Found { candidate, notices });
                }
                Err(Miss::Empty) => {
                    debug!(query = %text, resolver = tier.label(), "no result, advancing");
                }
                Err(Miss::Soft(reason)) => {
                    warn!(query = %text, resolver = tier.label(), %reason, "soft failure, advancing");
                }
                Err(Miss::RateLimited(message)) => {
                    warn!(query = %text, resolver = tier.label(), %message, "rate limited, advancing");
                    notices.push(Notice::RateLimited(message));
                }
            }
        }

        info!(query = %text, "not found");
        notices.push(Notice::NotFound(text.clone()));
        Ok(Resolution::NotFound { query: text, notices })
    }

    /// Resolve and publish into the shared result slot.
    ///
    /// Returns the resolution and whether it was applied; a newer request
    /// started meanwhile makes this one stale.
    pub fn resolve_into(&self, raw: &str, slot: &ResultSlot) -> Result<(Resolution, bool), PlaceError> {
        normalize_query(raw)?;
        let generation = slot.begin();
        let resolution = self.resolve(raw)?;
        let applied = slot.apply(generation, resolution.clone());
        Ok((resolution, applied))
    }

    /// Describe a clicked map point. Always yields a candidate.
    pub fn reverse(&self, at: Coordinate) -> Resolution {
        let mut notices = Vec::new();
        let hit = match self.services.reverse.reverse(at) {
            Ok(hit) => hit,
            Err(PlaceError::RateLimited(message)) => {
                warn!(%message, "reverse lookup rate limited");
                notices.push(Notice::RateLimited(message));
                Default::default()
            }
            Err(e) => {
                warn!(error = %e, "reverse lookup failed, using placeholder");
                Default::default()
            }
        };

        let name = pick_name(&hit.address, REVERSE_NAME_ORDER)
            .unwrap_or(UNKNOWN_LOCATION)
            .to_string();
        let place_type = match (hit.class.as_deref(), hit.kind.as_deref()) {
            (Some("amenity"), Some(kind)) => place_type_from_amenity(kind),
            _ => PlaceType::Other,
        };
        let description = hit
            .label
            .clone()
            .unwrap_or_else(|| format!("Dropped pin at {}", at));

        let candidate = Candidate {
            id: candidate_id("pin", &name, &at),
            name,
            coordinate: at,
            description,
            category: Category::HiddenGem,
            place_type,
            image: image_for(&self.config.image_base, place_type),
            address: hit.label,
            tier: Tier::Direct,
        };
        Resolution::Found { candidate, notices }
    }
}
