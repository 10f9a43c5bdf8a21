//! File-based Saved Set persistence at ~/.placefinder/places.json.
//!
//! Schema v2 wraps the list with a version and timestamp.
//! Backward compatible: a bare v1 array still loads.
//! Entries with an invalid coordinate are skipped on load.

use super::saved::SavedSet;
use super::types::{Place, PlaceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const SCHEMA_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    updated_at: i64,
    places: Vec<Value>,
}

/// The place store.
pub struct PlaceStore {
    path: PathBuf,
}

impl PlaceStore {
    /// Store at the default location (~/.placefinder/places.json).
    pub fn open() -> Self {
        Self { path: Self::default_path() }
    }

    /// Store at a specific path (for testing).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".placefinder")
            .join("places.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved places. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<Place>, PlaceError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let raw: Vec<Value> = match serde_json::from_str::<Value>(&data)? {
            Value::Array(items) => items,
            other => serde_json::from_value::<StoreFile>(other)?.places,
        };

        Ok(raw
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Place>(v) {
                Ok(place) => Some(place),
                Err(e) => {
                    warn!(error = %e, path = %self.path.display(), "skipping unreadable place");
                    None
                }
            })
            .collect())
    }

    /// Load straight into a Saved Set.
    pub fn load_set(&self) -> Result<SavedSet, PlaceError> {
        Ok(SavedSet::new(self.load()?))
    }

    pub fn save(&self, places: &[Place]) -> Result<(), PlaceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            version: SCHEMA_VERSION,
            updated_at: chrono::Utc::now().timestamp_millis(),
            places: places
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        };
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn save_set(&self, set: &SavedSet) -> Result<(), PlaceError> {
        self.save(&set.snapshot())
    }
}
