//! Display descriptors for recent entries (what a file list shows per row)

use chrono::{DateTime, Local, Utc};

use crate::store::RecentEntry;

/// Format used for the "last opened" column
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One row of the recent files listing.
///
/// Sent over D-Bus as `(ssssx)`, so the optional timestamp is flattened:
/// `last_opened` is empty and `last_opened_ms` is 0 when no open time was
/// ever recorded.
#[derive(Debug, Clone, PartialEq, Eq, zbus::zvariant::Type, serde::Serialize, serde::Deserialize)]
pub struct RecentFileInfo {
    /// The recent-file reference (e.g. "recent:///home/user/a.txt")
    pub url: String,
    /// Local path the reference points at
    pub path: String,
    /// File name for display
    pub name: String,
    /// Local time of the last open, formatted for display
    pub last_opened: String,
    /// Milliseconds since the epoch
    pub last_opened_ms: i64,
}

impl RecentFileInfo {
    pub fn from_entry(entry: &RecentEntry) -> Self {
        let path = entry
            .url
            .to_local_path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            url: entry.url.to_string(),
            path,
            name: entry.url.file_name(),
            last_opened: entry.last_opened.map(format_time).unwrap_or_default(),
            last_opened_ms: entry.last_opened.map_or(0, |t| t.timestamp_millis()),
        }
    }

    /// Whether the file still exists on disk
    pub fn exists(&self) -> bool {
        !self.path.is_empty() && std::path::Path::new(&self.path).exists()
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Builds display rows for a whole snapshot, keeping its order.
pub fn describe(entries: &[RecentEntry]) -> Vec<RecentFileInfo> {
    entries.iter().map(RecentFileInfo::from_entry).collect()
}
