//! Autocomplete while typing.
//!
//! Each keystroke cancels the previous fetch (single flight per session),
//! waits out a quiet period, then asks the directory. A generation counter
//! drops any result that still lands after a newer keystroke.
//!
//! `SuggestionSession` is the entry point for interactive front-ends that
//! own an input box. The CLI and `/api/suggest` are request/response, so
//! they call the one-shot `suggest` and leave debouncing to the client.

use super::normalize::{pick_name, SUGGESTION_NAME_ORDER};
use super::providers::{DirectoryHit, DirectoryService};
use super::resolver::candidate_from_hit;
use super::types::{Candidate, PlaceError, Tier};
use crate::config::Config;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// One directory hit offered while typing.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub title: String,
    pub hit: DirectoryHit,
}

impl Suggestion {
    pub fn from_hit(hit: DirectoryHit) -> Self {
        let title = pick_name(&hit.address, SUGGESTION_NAME_ORDER)
            .map(String::from)
            .unwrap_or_else(|| hit.label.clone());
        Self { title, hit }
    }

    /// Turn the selected suggestion into a candidate. No further lookup.
    pub fn into_candidate(self, image_base: &str) -> Candidate {
        let mut candidate = candidate_from_hit(self.hit, &self.title, Tier::Direct, image_base);
        candidate.name = self.title;
        candidate
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionView {
    pub title: String,
    pub label: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<&Suggestion> for SuggestionView {
    fn from(s: &Suggestion) -> Self {
        Self {
            title: s.title.clone(),
            label: s.hit.label.clone(),
            lat: s.hit.coordinate.lat(),
            lng: s.hit.coordinate.lng(),
        }
    }
}

/// One-shot lookup, gated by the minimum input length.
pub fn suggest(
    directory: &dyn DirectoryService,
    text: &str,
    min_chars: usize,
    limit: usize,
) -> Result<Vec<Suggestion>, PlaceError> {
    let text = text.trim();
    if text.chars().count() < min_chars {
        return Ok(Vec::new());
    }
    Ok(directory
        .search(text, limit)?
        .into_iter()
        .map(Suggestion::from_hit)
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionState {
    Idle,
    Pending { input: String },
    Ready { input: String, suggestions: Vec<Suggestion> },
    Failed { input: String, message: String },
}

/// Debounced, single-flight autocomplete for one input box.
pub struct SuggestionSession {
    directory: Arc<dyn DirectoryService>,
    debounce: Duration,
    min_chars: usize,
    limit: usize,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    state: Arc<watch::Sender<SuggestionState>>,
}

impl SuggestionSession {
    pub fn new(directory: Arc<dyn DirectoryService>, config: &Config) -> Self {
        let (tx, _rx) = watch::channel(SuggestionState::Idle);
        Self {
            directory,
            debounce: config.suggest_debounce(),
            min_chars: config.suggest_min_chars,
            limit: config.suggest_limit,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
            state: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    fn abort_in_flight(&self) -> u64 {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a keystroke. Must be called from inside a Tokio runtime.
    pub fn input(&self, text: &str) {
        let generation = self.abort_in_flight();
        let input = text.trim().to_string();

        if input.chars().count() < self.min_chars {
            self.state.send_replace(SuggestionState::Idle);
            return;
        }
        self.state.send_replace(SuggestionState::Pending { input: input.clone() });

        let directory = Arc::clone(&self.directory);
        let latest = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let (debounce, min_chars, limit) = (self.debounce, self.min_chars, self.limit);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let query = input.clone();
            let result = tokio::task::spawn_blocking(move || {
                suggest(directory.as_ref(), &query, min_chars, limit)
            })
            .await;

            if latest.load(Ordering::SeqCst) != generation {
                debug!(%input, "dropping stale suggestions");
                return;
            }
            let next = match result {
                Ok(Ok(suggestions)) => SuggestionState::Ready { input, suggestions },
                Ok(Err(e)) => SuggestionState::Failed { input, message: e.to_string() },
                Err(e) => SuggestionState::Failed { input, message: e.to_string() },
            };
            state.send_replace(next);
        });

        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Drop any pending fetch and go idle (input cleared or closed).
    pub fn cancel(&self) {
        self.abort_in_flight();
        self.state.send_replace(SuggestionState::Idle);
    }
}

impl Drop for SuggestionSession {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.in_flight.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::testing::{hit, FakeDirectory};
    use crate::place::types::PlaceType;

    fn config(debounce_ms: u64) -> Config {
        Config {
            suggest_debounce_ms: debounce_ms,
            ..Config::default()
        }
    }

    fn directory() -> Arc<FakeDirectory> {
        let d = Arc::new(FakeDirectory::default());
        d.insert(
            "tiong",
            vec![hit(1.2846, 103.832, "Tiong Bahru Bakery, Eng Hoon Street, Singapore", Some("shop"), Some("bakery"), &[("shop", "Tiong Bahru Bakery")])],
        );
        d.insert("merl", vec![hit(1.28, 103.85, "Merlion Walk, Singapore", None, None, &[])]);
        d.insert("merlion", vec![hit(1.2868, 103.8545, "Merlion, Fullerton Road, Singapore", Some("tourism"), Some("attraction"), &[("tourism", "Merlion")])]);
        d
    }

    async fn wait_ready(rx: &mut watch::Receiver<SuggestionState>) -> SuggestionState {
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| matches!(s, SuggestionState::Ready { .. } | SuggestionState::Failed { .. })),
        )
        .await
        .expect("suggestions did not settle")
        .expect("session dropped")
        .clone()
    }

    #[test]
    fn test_suggest_gated_by_length() {
        let d = directory();
        assert!(suggest(d.as_ref(), "ti", 3, 5).unwrap().is_empty());
        assert!(d.queries().is_empty());
        assert_eq!(suggest(d.as_ref(), " tiong ", 3, 5).unwrap().len(), 1);
    }

    #[test]
    fn test_selection_synthesizes_candidate() {
        let d = directory();
        let s = suggest(d.as_ref(), "tiong", 3, 5).unwrap().remove(0);
        assert_eq!(s.title, "Tiong Bahru Bakery");
        let c = s.into_candidate("");
        assert_eq!(c.name, "Tiong Bahru Bakery");
        assert_eq!(c.place_type, PlaceType::Other);
        assert_eq!(c.tier, Tier::Direct);
        assert_eq!(d.queries().len(), 1);
    }

    #[test]
    fn test_title_falls_back_to_raw_label() {
        let s = Suggestion::from_hit(hit(1.3, 103.8, "Block 123, Bedok North, Singapore", None, None, &[]));
        assert_eq!(s.title, "Block 123, Bedok North, Singapore");
    }

    #[tokio::test]
    async fn test_burst_of_keystrokes_fetches_once() {
        let d = directory();
        let session = SuggestionSession::new(d.clone(), &config(40));
        let mut rx = session.subscribe();

        session.input("tio");
        session.input("tion");
        session.input("tiong");

        match wait_ready(&mut rx).await {
            SuggestionState::Ready { input, suggestions } => {
                assert_eq!(input, "tiong");
                assert_eq!(suggestions.len(), 1);
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(d.queries(), vec!["tiong"]);
    }

    #[tokio::test]
    async fn test_slow_fetch_superseded() {
        let d = directory();
        d.set_delay(Duration::from_millis(150));
        let session = SuggestionSession::new(d.clone(), &config(10));
        let mut rx = session.subscribe();

        session.input("merl");
        tokio::time::sleep(Duration::from_millis(60)).await;
        session.input("merlion");

        match wait_ready(&mut rx).await {
            SuggestionState::Ready { input, .. } => assert_eq!(input, "merlion"),
            other => panic!("unexpected state {:?}", other),
        }
        // Give the abandoned "merl" lookup time to finish; it must not win.
        tokio::time::sleep(Duration::from_millis(250)).await;
        match session.state() {
            SuggestionState::Ready { input, .. } => assert_eq!(input, "merlion"),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_input_goes_idle() {
        let d = directory();
        let session = SuggestionSession::new(d.clone(), &config(10));
        session.input("ti");
        assert_eq!(session.state(), SuggestionState::Idle);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(d.queries().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_fetch() {
        let d = directory();
        let session = SuggestionSession::new(d.clone(), &config(30));
        session.input("tiong");
        session.cancel();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(session.state(), SuggestionState::Idle);
        assert!(d.queries().is_empty());
    }
}
