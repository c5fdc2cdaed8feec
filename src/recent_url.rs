//! # Recent-File References
//!
//! A recent-file reference wraps an absolute local path in the `recent:`
//! scheme, e.g. `recent:///home/user/notes%20draft.txt`. It is the key the
//! store de-duplicates on and the string written to the backing file, so a
//! recent entry is never confused with a plain `file://` location.
//!
//! Paths are normalized lexically (`.` dropped, `..` folded) before wrapping,
//! so two spellings of the same file produce the same reference.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use url::Url;

/// URL scheme marking a recent-file reference
pub const RECENT_SCHEME: &str = "recent";

/// URL scheme of plain local files
pub const FILE_SCHEME: &str = "file";

/// A stable identifier for a recently opened local file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecentUrl(Url);

/// Error returned when a string is not a usable recent-file reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a recent-file reference: '{0}'")]
pub struct InvalidRecentUrl(pub String);

impl RecentUrl {
    /// Wraps an absolute local path. Returns `None` for relative paths.
    pub fn from_local_path(path: &Path) -> Option<Self> {
        if !path.is_absolute() {
            return None;
        }
        let file_url = Url::from_file_path(normalize(path)).ok()?;
        Self::from_encoded_path(file_url.path())
    }

    /// Wraps the path of a `file:` URL. Any other scheme (or a `file:` URL
    /// naming a remote host) yields `None`.
    pub fn from_file_url(url: &Url) -> Option<Self> {
        if !is_local_file(url) {
            return None;
        }
        let path = url.to_file_path().ok()?;
        Self::from_local_path(&path)
    }

    /// Builds `recent://<path>` from an already percent-encoded path.
    fn from_encoded_path(encoded: &str) -> Option<Self> {
        if !encoded.starts_with('/') {
            return None;
        }
        Url::parse(&format!("{RECENT_SCHEME}://{encoded}")).ok().map(Self)
    }

    /// The local file this reference points at.
    pub fn to_local_path(&self) -> Option<PathBuf> {
        self.to_file_url()?.to_file_path().ok()
    }

    /// The equivalent `file://` URL.
    pub fn to_file_url(&self) -> Option<Url> {
        Url::parse(&format!("{FILE_SCHEME}://{}", self.0.path())).ok()
    }

    /// Last path segment, decoded (e.g. "notes draft.txt").
    pub fn file_name(&self) -> String {
        self.to_local_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| self.0.path().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RecentUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for RecentUrl {
    type Err = InvalidRecentUrl;

    /// Accepts `recent:///abs/path` (and the authority-less `recent:/abs/path`),
    /// always producing the canonical `recent:///` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRecentUrl(s.to_string());
        let parsed = Url::parse(s).map_err(|_| invalid())?;

        if parsed.scheme() != RECENT_SCHEME || !parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid());
        }

        // Round-trip through the local path so the stored form is normalized
        let url = Self::from_encoded_path(parsed.path()).ok_or_else(invalid)?;
        url.to_local_path()
            .and_then(|path| Self::from_local_path(&path))
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for RecentUrl {
    type Error = InvalidRecentUrl;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecentUrl> for String {
    fn from(url: RecentUrl) -> Self {
        url.0.into()
    }
}

/// `true` when the URL denotes a file on this machine.
pub fn is_local_file(url: &Url) -> bool {
    url.scheme() == FILE_SCHEME && url.to_file_path().is_ok()
}

/// Parses user input: an absolute path becomes a `file://` URL, anything
/// else must be a URI.
pub fn parse_location(input: &str) -> Option<Url> {
    if input.starts_with('/') {
        return Url::from_file_path(normalize(Path::new(input))).ok();
    }
    Url::parse(input).ok()
}

/// Lexical normalization: drops `.` and folds `..` without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
