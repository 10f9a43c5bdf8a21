//! Runtime configuration at ~/.placefinder/config.json.
//!
//! Every field has a default, so a partial (or missing) file is fine.
//! The Gemini key may also come from `GEMINI_API_KEY`.

use crate::place::types::PlaceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region name appended to every directory query (e.g. "Singapore").
    pub region: String,
    /// ISO 3166-1 alpha-2 code for the directory region restriction.
    pub country_code: String,
    /// Regex for the locale's postal-code token.
    pub postal_code_pattern: String,
    /// Address seeds shorter than this fall through to a name query.
    pub min_seed_len: usize,

    pub directory_url: String,
    pub reverse_url: String,
    pub overpass_url: String,
    pub gemini_url: String,
    pub gemini_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub user_agent: String,

    pub directory_limit: usize,
    pub suggest_limit: usize,
    pub area_limit: usize,
    pub area_timeout_secs: u64,
    pub http_timeout_secs: u64,

    pub suggest_debounce_ms: u64,
    pub suggest_min_chars: usize,

    /// Base URI for per-type placeholder images.
    pub image_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "Singapore".into(),
            country_code: "sg".into(),
            postal_code_pattern: r"\b\d{6}\b".into(),
            min_seed_len: 5,
            directory_url: "https://nominatim.openstreetmap.org/search".into(),
            reverse_url: "https://nominatim.openstreetmap.org/reverse".into(),
            overpass_url: "https://overpass-api.de/api/interpreter".into(),
            gemini_url: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            gemini_model: "gemini-2.0-flash".into(),
            gemini_api_key: None,
            user_agent: concat!("placefinder/", env!("CARGO_PKG_VERSION")).into(),
            directory_limit: 1,
            suggest_limit: 5,
            area_limit: 50,
            area_timeout_secs: 25,
            http_timeout_secs: 10,
            suggest_debounce_ms: 300,
            suggest_min_chars: 3,
            image_base: "https://placehold.co/600x400?text=".into(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, PlaceError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default().with_env())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, PlaceError> {
        let data = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config.with_env())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".placefinder")
            .join("config.json")
    }

    fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.gemini_api_key = Some(key);
            }
        }
        self
    }

    fn validate(&self) -> Result<(), PlaceError> {
        if self.region.trim().is_empty() {
            return Err(PlaceError::Config("region must not be empty".into()));
        }
        if regex::Regex::new(&self.postal_code_pattern).is_err() {
            return Err(PlaceError::Config(format!(
                "invalid postal_code_pattern '{}'",
                self.postal_code_pattern
            )));
        }
        if self.directory_limit == 0 || self.suggest_limit == 0 {
            return Err(PlaceError::Config("result limits must be at least 1".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn suggest_debounce(&self) -> Duration {
        Duration::from_millis(self.suggest_debounce_ms)
    }
}
