//! Reading-position persistence on top of a string key-value store.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::engine::Location;
use crate::error::{BookracyError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub const POSITION_KEY_PREFIX: &str = "bookracy:position:";
pub const POSITION_RECORD_VERSION: u32 = 1;

/// String keys, JSON string values. Implementations lock internally so one
/// store can be shared between sessions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Lowercase hex SHA-256 of a book's source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_url(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        Fingerprint(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn storage_key(&self) -> String {
        format!("{POSITION_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_version() -> u32 {
    POSITION_RECORD_VERSION
}

/// Where a reader left off in one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    #[serde(default = "default_version")]
    pub version: u32,
    pub fingerprint: Fingerprint,
    pub title: String,
    pub source_url: String,
    pub location: Location,
    /// 0 together with `total_pages == 0` when the page is unknown.
    pub current_page: usize,
    pub total_pages: usize,
}

impl ReadingPosition {
    pub fn new(
        title: impl Into<String>,
        source_url: impl Into<String>,
        location: Location,
        page: Option<(usize, usize)>,
    ) -> Self {
        let source_url = source_url.into();
        let (current_page, total_pages) = match page {
            Some((current, total)) if total > 0 => (current.clamp(1, total), total),
            _ => (0, 0),
        };
        Self {
            version: POSITION_RECORD_VERSION,
            fingerprint: Fingerprint::of_url(&source_url),
            title: title.into(),
            source_url,
            location,
            current_page,
            total_pages,
        }
    }
}

/// Typed view over a [`KeyValueStore`]: one record per fingerprint.
#[derive(Clone)]
pub struct PositionStore {
    store: Arc<dyn KeyValueStore>,
}

impl PositionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored position for `fingerprint`. Unreadable records and records
    /// written by a newer version are treated as absent.
    pub fn load(&self, fingerprint: &Fingerprint) -> Result<Option<ReadingPosition>> {
        let key = fingerprint.storage_key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        Ok(Self::decode(&key, &raw))
    }

    fn decode(key: &str, raw: &str) -> Option<ReadingPosition> {
        match serde_json::from_str::<ReadingPosition>(raw) {
            Ok(position) if position.version > POSITION_RECORD_VERSION => {
                warn!(
                    "ignoring {key}: record version {} is newer than supported",
                    position.version
                );
                None
            }
            Ok(position) => Some(position),
            Err(e) => {
                warn!("ignoring unreadable record {key}: {e}");
                None
            }
        }
    }

    /// Overwrite the record for the position's fingerprint.
    pub fn save(&self, position: &ReadingPosition) -> Result<()> {
        let key = position.fingerprint.storage_key();
        let value = serde_json::to_string(position)?;
        self.store.set(&key, &value)?;
        debug!("saved {key} at {}", position.location);
        Ok(())
    }

    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let key = fingerprint.storage_key();
        let existed = self.store.get(&key)?.is_some();
        if existed {
            self.store.remove(&key)?;
        }
        Ok(existed)
    }

    pub fn list(&self) -> Result<Vec<ReadingPosition>> {
        let mut positions = Vec::new();
        for key in self.store.keys(POSITION_KEY_PREFIX)? {
            if let Some(raw) = self.store.get(&key)?
                && let Some(position) = Self::decode(&key, &raw)
            {
                positions.push(position);
            }
        }
        Ok(positions)
    }
}

pub(crate) fn write_error(key: &str, reason: impl fmt::Display) -> BookracyError {
    BookracyError::PersistenceWrite {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
