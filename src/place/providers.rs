//! Remote lookup providers: Gemini (structured knowledge), Nominatim
//! (directory + reverse), and Overpass (area discovery).
//!
//! Each provider sits behind a small trait so the resolver can be driven by
//! in-memory fakes. The HTTP implementations only translate the request and
//! response contract; classification into soft failures happens upstream.

use super::normalize::{extract_json_object, validate_answer, KnowledgeAnswer};
use super::types::{Coordinate, PlaceError};
use crate::config::Config;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ─── Contracts ──────────────────────────────────────────────────

/// Search-grounded generative lookup returning the fixed answer schema.
pub trait KnowledgeService: Send + Sync {
    fn ask(&self, query: &str) -> Result<KnowledgeAnswer, PlaceError>;
}

/// One ranked directory result.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryHit {
    pub coordinate: Coordinate,
    pub label: String,
    /// OSM primary key, e.g. "amenity".
    pub class: Option<String>,
    /// OSM value for `class`, e.g. "restaurant".
    pub kind: Option<String>,
    /// Address breakdown; POIs carry their own name under their class key.
    pub address: BTreeMap<String, String>,
}

pub trait DirectoryService: Send + Sync {
    /// Ranked results for `query`, region-restricted, at most `limit`.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<DirectoryHit>, PlaceError>;
}

/// Reverse lookup result. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReverseHit {
    pub label: Option<String>,
    pub class: Option<String>,
    pub kind: Option<String>,
    pub address: BTreeMap<String, String>,
}

pub trait ReverseService: Send + Sync {
    fn reverse(&self, at: Coordinate) -> Result<ReverseHit, PlaceError>;
}

/// A viewport in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, PlaceError> {
        // Corners go through Coordinate validation.
        Coordinate::new(south, west)?;
        Coordinate::new(north, east)?;
        if south > north {
            return Err(PlaceError::InvalidCoordinate { lat: south, lng: west });
        }
        Ok(Self { south, west, north, east })
    }
}

/// A tagged point of interest from the area service.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaElement {
    pub osm_type: String,
    pub id: i64,
    pub coordinate: Coordinate,
    pub tags: BTreeMap<String, String>,
}

pub trait AreaService: Send + Sync {
    fn discover(&self, bbox: &BoundingBox) -> Result<Vec<AreaElement>, PlaceError>;
}

/// The full set of collaborators one resolver needs.
#[derive(Clone)]
pub struct Services {
    pub knowledge: Arc<dyn KnowledgeService>,
    pub directory: Arc<dyn DirectoryService>,
    pub reverse: Arc<dyn ReverseService>,
    pub area: Arc<dyn AreaService>,
}

impl Services {
    /// Live HTTP providers built from config.
    pub fn http(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout())
            .user_agent(&config.user_agent)
            .build();
        let nominatim = Arc::new(Nominatim::new(agent.clone(), config));
        Self {
            knowledge: Arc::new(Gemini::new(agent.clone(), config)),
            directory: nominatim.clone(),
            reverse: nominatim,
            area: Arc::new(Overpass::new(agent, config)),
        }
    }
}

// ─── Transport errors ───────────────────────────────────────────

fn classify_ureq(err: ureq::Error) -> PlaceError {
    match err {
        ureq::Error::Status(429, response) => {
            let body = response.into_string().unwrap_or_default();
            PlaceError::RateLimited(rate_limit_message(&body))
        }
        ureq::Error::Status(code, response) => {
            PlaceError::Network(format!("HTTP {} from {}", code, response.get_url()))
        }
        ureq::Error::Transport(t) => PlaceError::Network(t.to_string()),
    }
}

/// Prefer the provider's own message; fall back to a generic one.
fn rate_limit_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| "quota exceeded, try again later".to_string())
}

// ─── Gemini ─────────────────────────────────────────────────────

pub struct Gemini {
    agent: ureq::Agent,
    url: String,
    model: String,
    api_key: Option<String>,
    region: String,
}

impl Gemini {
    pub fn new(agent: ureq::Agent, config: &Config) -> Self {
        Self {
            agent,
            url: config.gemini_url.clone(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
            region: config.region.clone(),
        }
    }
}

impl KnowledgeService for Gemini {
    fn ask(&self, query: &str) -> Result<KnowledgeAnswer, PlaceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PlaceError::Config("no Gemini API key configured".into()))?;

        let url = format!("{}/{}:generateContent", self.url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": knowledge_prompt(query, &self.region) }] }],
            "tools": [{ "google_search": {} }],
        });

        let response = self
            .agent
            .post(&url)
            .query("key", key)
            .send_json(body)
            .map_err(classify_ureq)?;

        let reply: Value = response
            .into_json()
            .map_err(|e| PlaceError::InvalidResponse(e.to_string()))?;

        parse_knowledge_reply(&reply)
    }
}

pub fn knowledge_prompt(query: &str, region: &str) -> String {
    format!(
        "Find the place \"{query}\" in {region}. Respond with a single JSON object and nothing else, \
         matching this schema:\n\
         {{\"name\": string, \"address\": string, \"coordinates\": {{\"lat\": number, \"lng\": number}} (optional), \
         \"description\": string, \"category\": \"HiddenGem\" | \"TouristTrap\", \
         \"placeType\": \"Restaurant\" | \"Bar\" | \"Cafe\" | \"Activity\" | \"Other\"}}\n\
         Use the full street address including the postal code when known."
    )
}

/// Extract and validate the answer from a generateContent reply.
pub fn parse_knowledge_reply(reply: &Value) -> Result<KnowledgeAnswer, PlaceError> {
    if let Some(status) = reply.pointer("/error/status").and_then(Value::as_str) {
        let message = reply
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or(status)
            .to_string();
        return Err(if status == "RESOURCE_EXHAUSTED" {
            PlaceError::RateLimited(message)
        } else {
            PlaceError::InvalidResponse(message)
        });
    }

    let parts = reply
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| PlaceError::InvalidResponse("no candidates in reply".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    let object = extract_json_object(&text)
        .ok_or_else(|| PlaceError::InvalidResponse("reply contains no JSON object".into()))?;

    let value: Value = serde_json::from_str(object)
        .map_err(|e| PlaceError::InvalidResponse(format!("reply is not valid JSON: {}", e)))?;

    validate_answer(&value)
}

// ─── Nominatim ──────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct NominatimResult {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, alias = "class")]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub address: BTreeMap<String, Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn string_fields(raw: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    raw.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

fn parse_coordinate(lat: Option<&str>, lon: Option<&str>) -> Option<Coordinate> {
    let lat: f64 = lat?.trim().parse().ok()?;
    let lng: f64 = lon?.trim().parse().ok()?;
    Coordinate::new(lat, lng).ok()
}

/// Convert raw search results, dropping entries without a usable coordinate.
pub fn parse_directory(results: Vec<NominatimResult>) -> Vec<DirectoryHit> {
    results
        .into_iter()
        .filter_map(|r| {
            let coordinate = parse_coordinate(r.lat.as_deref(), r.lon.as_deref())?;
            Some(DirectoryHit {
                coordinate,
                label: r.display_name.unwrap_or_default(),
                class: r.category,
                kind: r.kind,
                address: string_fields(&r.address),
            })
        })
        .collect()
}

pub fn parse_reverse(result: NominatimResult) -> ReverseHit {
    ReverseHit {
        label: result.display_name,
        class: result.category,
        kind: result.kind,
        address: string_fields(&result.address),
    }
}

pub struct Nominatim {
    agent: ureq::Agent,
    search_url: String,
    reverse_url: String,
    country_code: String,
}

impl Nominatim {
    pub fn new(agent: ureq::Agent, config: &Config) -> Self {
        Self {
            agent,
            search_url: config.directory_url.clone(),
            reverse_url: config.reverse_url.clone(),
            country_code: config.country_code.clone(),
        }
    }
}

impl DirectoryService for Nominatim {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<DirectoryHit>, PlaceError> {
        debug!(query, limit, "directory search");
        let response = self
            .agent
            .get(&self.search_url)
            .query("q", query)
            .query("format", "jsonv2")
            .query("addressdetails", "1")
            .query("limit", &limit.max(1).to_string())
            .query("countrycodes", &self.country_code)
            .call()
            .map_err(classify_ureq)?;

        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| PlaceError::InvalidResponse(e.to_string()))?;

        Ok(parse_directory(results))
    }
}

impl ReverseService for Nominatim {
    fn reverse(&self, at: Coordinate) -> Result<ReverseHit, PlaceError> {
        debug!(lat = at.lat(), lng = at.lng(), "reverse lookup");
        let response = self
            .agent
            .get(&self.reverse_url)
            .query("lat", &at.lat().to_string())
            .query("lon", &at.lng().to_string())
            .query("format", "jsonv2")
            .query("addressdetails", "1")
            .call()
            .map_err(classify_ureq)?;

        let result: NominatimResult = response
            .into_json()
            .map_err(|e| PlaceError::InvalidResponse(e.to_string()))?;

        // Nominatim answers 200 with {"error": ...} over open water.
        if let Some(err) = result.error {
            debug!(%err, "reverse lookup returned no address");
            return Ok(ReverseHit::default());
        }
        Ok(parse_reverse(result))
    }
}

// ─── Overpass ───────────────────────────────────────────────────

pub const AREA_AMENITIES: &[&str] = &["restaurant", "cafe", "bar", "pub"];
pub const AREA_TOURISM: &[&str] = &["attraction", "viewpoint", "museum"];

/// Overpass QL for the fixed discovery tag expression inside `bbox`.
pub fn overpass_query(bbox: &BoundingBox, limit: usize, timeout_secs: u64) -> String {
    let b = format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east);
    format!(
        "[out:json][timeout:{timeout}];\n(\n  nwr[\"amenity\"~\"^({amenity})$\"]({b});\n  nwr[\"tourism\"~\"^({tourism})$\"]({b});\n);\nout center {limit};",
        timeout = timeout_secs,
        amenity = AREA_AMENITIES.join("|"),
        tourism = AREA_TOURISM.join("|"),
        b = b,
        limit = limit,
    )
}

#[derive(Deserialize, Debug)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize, Debug)]
struct OverpassElement {
    #[serde(rename = "type")]
    osm_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Parse an interpreter response. Ways and relations use their `center`.
pub fn parse_overpass(body: &str) -> Result<Vec<AreaElement>, PlaceError> {
    let response: OverpassResponse = serde_json::from_str(body)
        .map_err(|e| PlaceError::InvalidResponse(e.to_string()))?;

    Ok(response
        .elements
        .into_iter()
        .filter_map(|e| {
            let (lat, lon) = match (e.lat, e.lon, &e.center) {
                (Some(lat), Some(lon), _) => (lat, lon),
                (_, _, Some(c)) => (c.lat, c.lon),
                _ => return None,
            };
            let coordinate = Coordinate::new(lat, lon).ok()?;
            Some(AreaElement {
                osm_type: e.osm_type,
                id: e.id,
                coordinate,
                tags: e.tags,
            })
        })
        .collect())
}

pub struct Overpass {
    agent: ureq::Agent,
    url: String,
    limit: usize,
    timeout_secs: u64,
}

impl Overpass {
    pub fn new(agent: ureq::Agent, config: &Config) -> Self {
        Self {
            agent,
            url: config.overpass_url.clone(),
            limit: config.area_limit,
            timeout_secs: config.area_timeout_secs,
        }
    }
}

impl AreaService for Overpass {
    fn discover(&self, bbox: &BoundingBox) -> Result<Vec<AreaElement>, PlaceError> {
        let query = overpass_query(bbox, self.limit, self.timeout_secs);
        debug!(%query, "area discovery");

        // Server-side timeout plus headroom for the transfer.
        let response = self
            .agent
            .post(&self.url)
            .timeout(Duration::from_secs(self.timeout_secs + 5))
            .send_string(&query)
            .map_err(classify_ureq)?;

        let body = response
            .into_string()
            .map_err(|e| PlaceError::InvalidResponse(e.to_string()))?;

        parse_overpass(&body)
    }
}
