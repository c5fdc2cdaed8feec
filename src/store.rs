//! # Recent Files Store
//!
//! Keeps the ordered list of recently opened local files and their last-open
//! times, persisted as JSON:
//!
//! ```json
//! {
//!     "RecentHistory": [
//!         { "url": "recent:///home/user/a.txt", "lastOpened": 1767225600000 }
//!     ]
//! }
//! ```
//!
//! Entries keep insertion order; opening a tracked file again only refreshes
//! its timestamp. Every mutating call saves before returning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use url::Url;

use crate::config::ConfigPathResolver;
use crate::error::StoreError;
use crate::recent_url::{is_local_file, RecentUrl};

/// Logical name of the backing file, resolved by a [`ConfigPathResolver`]
pub const STORE_NAME: &str = "recenthistory";

/// Top-level array holding the records
const HISTORY_KEY: &str = "RecentHistory";
const URL_KEY: &str = "url";
const LAST_OPENED_KEY: &str = "lastOpened";

/// One tracked file as handed out by [`RecentFilesStore::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    pub url: RecentUrl,
    /// `None` only if no open time was ever recorded
    pub last_opened: Option<DateTime<Utc>>,
}

/// A record exactly as decoded from the backing file, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct HistoryRecord {
    url: String,
    last_opened_ms: i64,
}

impl HistoryRecord {
    /// Reads the known fields, defaulting each one that is missing or has
    /// the wrong type.
    fn decode(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            url: object
                .get(URL_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            last_opened_ms: object
                .get(LAST_OPENED_KEY)
                .and_then(Value::as_i64)
                .unwrap_or_default(),
        }
    }
}

/// Decodes a whole document. A non-object document or a missing/non-array
/// `RecentHistory` is an empty history.
fn decode_document(document: &Value) -> Vec<HistoryRecord> {
    document
        .get(HISTORY_KEY)
        .and_then(Value::as_array)
        .map(|records| records.iter().map(HistoryRecord::decode).collect())
        .unwrap_or_default()
}

/// Truncates to the millisecond resolution used on disk.
fn to_millis_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

/// Recently opened files with their last-open timestamps.
#[derive(Debug)]
pub struct RecentFilesStore {
    path: PathBuf,
    entries: Vec<RecentUrl>,
    timestamps: HashMap<RecentUrl, DateTime<Utc>>,
}

impl RecentFilesStore {
    /// Creates an empty store bound to `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            timestamps: HashMap::new(),
        }
    }

    /// Creates a store and loads it from `path`.
    ///
    /// A missing or broken file leaves the store empty; the failure is only
    /// logged.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        if let Err(e) = store.load() {
            match &e {
                StoreError::Read { .. } => tracing::debug!("{e}"),
                _ => tracing::warn!("{e}"),
            }
        }
        store
    }

    /// Resolves the backing file through `resolver` and opens it.
    pub fn from_resolver(resolver: &impl ConfigPathResolver) -> Result<Self, StoreError> {
        let path = resolver
            .config_path(STORE_NAME)
            .ok_or_else(|| StoreError::NoConfigPath(STORE_NAME.to_string()))?;
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &RecentUrl) -> bool {
        self.entries.contains(url)
    }

    pub fn last_opened(&self, url: &RecentUrl) -> Option<DateTime<Utc>> {
        self.timestamps.get(url).copied()
    }

    /// Replaces the in-memory history with the contents of the backing file.
    ///
    /// # Errors
    /// - [`StoreError::Read`]: the file can't be read; state is unchanged.
    /// - [`StoreError::Parse`]: the file isn't JSON; state is cleared.
    ///
    /// Malformed records never fail the load. Missing fields fall back to an
    /// empty url and a zero timestamp, and records whose url is not a
    /// recent-file reference are skipped. Such records are dropped from the
    /// file on the next save rather than kept as blank entries.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let data = std::fs::read(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        self.entries.clear();
        self.timestamps.clear();

        let document: Value = serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        for record in decode_document(&document) {
            let url = match record.url.parse::<RecentUrl>() {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping recent history record: {e}");
                    continue;
                }
            };
            let last_opened =
                DateTime::from_timestamp_millis(record.last_opened_ms).unwrap_or_default();

            if !self.contains(&url) {
                self.entries.push(url.clone());
            }
            self.timestamps.insert(url, last_opened);
        }

        tracing::debug!(
            "Loaded {} recent files from {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Builds the JSON document for the current history.
    fn to_document(&self) -> Value {
        let records: Vec<Value> = self
            .entries
            .iter()
            .map(|url| {
                let mut record = Map::new();
                record.insert(URL_KEY.to_string(), Value::String(url.to_string()));
                if let Some(time) = self.timestamps.get(url) {
                    record.insert(LAST_OPENED_KEY.to_string(), json!(time.timestamp_millis()));
                }
                Value::Object(record)
            })
            .collect();

        json!({ HISTORY_KEY: records })
    }

    /// Writes the history to the backing file.
    ///
    /// The document goes to a sibling temp file first and is renamed over
    /// the old one, so a crash mid-save leaves the previous history intact.
    pub fn save(&self) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let content = serde_json::to_string_pretty(&self.to_document())?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(e));
        }

        tracing::debug!(
            "Saved {} recent files to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Records that `url` was opened now. See [`Self::add_opened_file_at`].
    pub fn add_opened_file(&mut self, url: &Url) -> Result<bool, StoreError> {
        self.add_opened_file_at(url, Utc::now())
    }

    /// Records that `url` was opened at `time`.
    ///
    /// Non-local URLs are ignored: `Ok(false)`, nothing saved. Otherwise the
    /// timestamp is refreshed, the file is appended if it isn't tracked yet
    /// (a tracked file keeps its position) and the history is saved.
    pub fn add_opened_file_at(
        &mut self,
        url: &Url,
        time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if !is_local_file(url) {
            return Ok(false);
        }
        let Some(recent_url) = RecentUrl::from_file_url(url) else {
            return Ok(false);
        };

        self.timestamps
            .insert(recent_url.clone(), to_millis_precision(time));

        if !self.contains(&recent_url) {
            self.entries.push(recent_url);
        }

        self.save()?;
        Ok(true)
    }

    /// Removes one occurrence of each url and its timestamp, then saves once.
    ///
    /// Returns how many entries were actually removed.
    pub fn remove_recent_files(&mut self, urls: &[RecentUrl]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for url in urls {
            if let Some(index) = self.entries.iter().position(|entry| entry == url) {
                self.entries.remove(index);
                removed += 1;
            }
            self.timestamps.remove(url);
        }

        self.save()?;
        Ok(removed)
    }

    /// Forgets everything and saves the empty history.
    pub fn clear_recent_files(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        self.timestamps.clear();
        self.save()
    }

    /// Snapshot of the history in insertion order.
    pub fn enumerate(&self) -> Vec<RecentEntry> {
        self.entries
            .iter()
            .map(|url| RecentEntry {
                url: url.clone(),
                last_opened: self.last_opened(url),
            })
            .collect()
    }
}
