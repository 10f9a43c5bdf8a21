//! In-memory providers for unit tests. Each records what it was asked.

use super::normalize::KnowledgeAnswer;
use super::providers::{
    AreaElement, AreaService, BoundingBox, DirectoryHit, DirectoryService, KnowledgeService,
    ReverseHit, ReverseService, Services,
};
use super::types::{Coordinate, PlaceError};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub enum FakeReply {
    Answer(KnowledgeAnswer),
    /// Non-JSON or schema-mismatched body.
    Invalid,
    RateLimited(String),
    /// Transport failure.
    Down,
}

pub struct FakeKnowledge {
    reply: Mutex<FakeReply>,
    calls: AtomicUsize,
}

impl Default for FakeKnowledge {
    fn default() -> Self {
        Self {
            reply: Mutex::new(FakeReply::Down),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeKnowledge {
    pub fn reply(&self, reply: FakeReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KnowledgeService for FakeKnowledge {
    fn ask(&self, _query: &str) -> Result<KnowledgeAnswer, PlaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply.lock().unwrap().clone() {
            FakeReply::Answer(a) => Ok(a),
            FakeReply::Invalid => Err(PlaceError::InvalidResponse("reply is not valid JSON".into())),
            FakeReply::RateLimited(msg) => Err(PlaceError::RateLimited(msg)),
            FakeReply::Down => Err(PlaceError::Network("connection refused".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    hits: Mutex<HashMap<String, Vec<DirectoryHit>>>,
    queries: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeDirectory {
    pub fn insert(&self, query: &str, hits: Vec<DirectoryHit>) {
        self.hits.lock().unwrap().insert(query.to_string(), hits);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

impl DirectoryService for FakeDirectory {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<DirectoryHit>, PlaceError> {
        self.queries.lock().unwrap().push(query.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            std::thread::sleep(d);
        }
        let mut hits = self.hits.lock().unwrap().get(query).cloned().unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }
}

#[derive(Default)]
pub struct FakeReverse {
    hit: Mutex<Option<ReverseHit>>,
}

impl FakeReverse {
    /// `None` makes the lookup fail with a transport error.
    pub fn set(&self, hit: Option<ReverseHit>) {
        *self.hit.lock().unwrap() = hit;
    }
}

impl ReverseService for FakeReverse {
    fn reverse(&self, _at: Coordinate) -> Result<ReverseHit, PlaceError> {
        self.hit
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlaceError::Network("timed out".into()))
    }
}

#[derive(Default)]
pub struct FakeArea {
    elements: Mutex<Option<Vec<AreaElement>>>,
    calls: AtomicUsize,
}

impl FakeArea {
    /// `None` makes the lookup fail like a non-2xx response.
    pub fn set(&self, elements: Option<Vec<AreaElement>>) {
        *self.elements.lock().unwrap() = elements;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AreaService for FakeArea {
    fn discover(&self, _bbox: &BoundingBox) -> Result<Vec<AreaElement>, PlaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.elements
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlaceError::Network("HTTP 504 from overpass".into()))
    }
}

#[derive(Default, Clone)]
pub struct Fakes {
    pub knowledge: Arc<FakeKnowledge>,
    pub directory: Arc<FakeDirectory>,
    pub reverse: Arc<FakeReverse>,
    pub area: Arc<FakeArea>,
}

impl Fakes {
    pub fn services(&self) -> Services {
        Services {
            knowledge: self.knowledge.clone(),
            directory: self.directory.clone(),
            reverse: self.reverse.clone(),
            area: self.area.clone(),
        }
    }
}

pub fn hit(
    lat: f64,
    lng: f64,
    label: &str,
    class: Option<&str>,
    kind: Option<&str>,
    address: &[(&str, &str)],
) -> DirectoryHit {
    DirectoryHit {
        coordinate: Coordinate::new(lat, lng).unwrap(),
        label: label.to_string(),
        class: class.map(String::from),
        kind: kind.map(String::from),
        address: address
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn element(id: i64, name: Option<&str>, tags: &[(&str, &str)]) -> AreaElement {
    let mut tags: BTreeMap<String, String> = tags
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if let Some(name) = name {
        tags.insert("name".into(), name.into());
    }
    AreaElement {
        osm_type: "node".into(),
        id,
        coordinate: Coordinate::new(1.28 + id as f64 * 0.001, 103.85).unwrap(),
        tags,
    }
}
