//! # Recent History Service Module
//!
//! Exposes the recent files store as a D-Bus service. The service owns the
//! single store instance of the process and turns every call into a
//! [`HistoryEvent`], applied under one write lock.
//!
//! ## D-Bus Interface
//!
//! Service name: `io.github.recent_history.RecentHistory1`
//! Object path: `/io/github/recent_history/RecentHistory1`
//!
//! ### Methods
//! - `FileOpened(uri: String) -> bool` - Record an opened file (false if ignored)
//! - `RemoveRecentFiles(uris: Vec<String>) -> u32` - Forget some entries
//! - `ClearRecentFiles()` - Forget everything
//! - `Enumerate() -> Vec<RecentFileInfo>` - List entries in insertion order
//! - `OpenRecentFile(uri: String)` - Launch an entry with its default application
//! - `LocalPaths(uris: Vec<String>) -> Vec<String>` - Map entries to local paths
//! - `Reload()` - Re-read the backing file
//!
//! ### Signals
//! - `HistoryChanged(count: u32)` - Emitted after any change, with the new entry count
//!
//! Persistence failures never fail a call: the change is kept in memory and
//! the failure is logged.

use std::sync::Arc;
use tokio::sync::RwLock;

use zbus::{connection, interface, SignalContext};

use crate::error::StoreError;
use crate::events::HistoryEvent;
use crate::info::{self, RecentFileInfo};
use crate::recent_url::{parse_location, RecentUrl};
use crate::store::RecentFilesStore;

/// D-Bus service name
pub const SERVICE_NAME: &str = "io.github.recent_history.RecentHistory1";

/// D-Bus object path
pub const OBJECT_PATH: &str = "/io/github/recent_history/RecentHistory1";

/// The D-Bus interface implementation.
pub struct RecentHistoryService {
    store: Arc<RwLock<RecentFilesStore>>,
}

fn parse_recent_urls(uris: &[String]) -> zbus::fdo::Result<Vec<RecentUrl>> {
    uris.iter()
        .map(|uri| {
            uri.parse::<RecentUrl>()
                .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))
        })
        .collect()
}

fn log_store_error(e: &StoreError) {
    match e {
        StoreError::Read { .. } => tracing::debug!("{e}"),
        _ => tracing::warn!("{e}"),
    }
}

impl RecentHistoryService {
    pub fn new(store: Arc<RwLock<RecentFilesStore>>) -> Self {
        Self { store }
    }

    /// Applies an event under the write lock. Returns how many entries it
    /// touched, plus the resulting entry count.
    async fn dispatch(&self, event: HistoryEvent) -> (u32, u32) {
        let mut store = self.store.write().await;
        let applied = event.apply(&mut store);
        if let Some(e) = &applied.save_error {
            // The in-memory state moved on; only the save was lost
            log_store_error(e);
        }
        (applied.touched as u32, store.len() as u32)
    }

    async fn record_open(&self, uri: &str) -> zbus::fdo::Result<(bool, u32)> {
        let url = parse_location(uri)
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("not a location: '{uri}'")))?;
        let (touched, count) = self.dispatch(HistoryEvent::FileOpened(url)).await;
        Ok((touched > 0, count))
    }

    /// Records an already resolved entry, keeping its exact path bytes.
    async fn record_recent(&self, url: &RecentUrl) -> zbus::fdo::Result<(bool, u32)> {
        let file_url = url
            .to_file_url()
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("no local path for {url}")))?;
        let (touched, count) = self.dispatch(HistoryEvent::FileOpened(file_url)).await;
        Ok((touched > 0, count))
    }

    async fn remove(&self, uris: &[String]) -> zbus::fdo::Result<(u32, u32)> {
        let urls = parse_recent_urls(uris)?;
        Ok(self.dispatch(HistoryEvent::RemoveRequested(urls)).await)
    }

    async fn snapshot(&self) -> Vec<RecentFileInfo> {
        let store = self.store.read().await;
        info::describe(&store.enumerate())
    }

    async fn reload_store(&self) -> u32 {
        let mut store = self.store.write().await;
        if let Err(e) = store.load() {
            log_store_error(&e);
        }
        store.len() as u32
    }

    fn resolve_local_paths(uris: &[String]) -> zbus::fdo::Result<Vec<String>> {
        parse_recent_urls(uris)?
            .iter()
            .map(|url| {
                url.to_local_path()
                    .map(|p| p.to_string_lossy().to_string())
                    .ok_or_else(|| {
                        zbus::fdo::Error::InvalidArgs(format!("no local path for {url}"))
                    })
            })
            .collect()
    }
}

#[interface(name = "io.github.recent_history.RecentHistory1")]
impl RecentHistoryService {
    /// Record that a file was opened. Non-local locations are ignored.
    async fn file_opened(
        &self,
        uri: String,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<bool> {
        let (changed, count) = self.record_open(&uri).await?;
        if changed {
            Self::history_changed(&ctx, count).await?;
        }
        Ok(changed)
    }

    /// Forget the given recent-file references. Returns how many were removed.
    async fn remove_recent_files(
        &self,
        uris: Vec<String>,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<u32> {
        let (removed, count) = self.remove(&uris).await?;
        if removed > 0 {
            Self::history_changed(&ctx, count).await?;
        }
        Ok(removed)
    }

    /// Forget every entry
    async fn clear_recent_files(
        &self,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let (cleared, count) = self.dispatch(HistoryEvent::ClearRequested).await;
        if cleared > 0 {
            Self::history_changed(&ctx, count).await?;
        }
        Ok(())
    }

    /// List entries in insertion order
    async fn enumerate(&self) -> Vec<RecentFileInfo> {
        self.snapshot().await
    }

    /// Open an entry with the desktop's default application and record it
    async fn open_recent_file(
        &self,
        uri: String,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let url = uri
            .parse::<RecentUrl>()
            .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        let path = url
            .to_local_path()
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("no local path for {url}")))?;

        open::that_detached(&path).map_err(|e| {
            zbus::fdo::Error::Failed(format!("Failed to open {}: {e}", path.display()))
        })?;

        let (changed, count) = self.record_recent(&url).await?;
        if changed {
            Self::history_changed(&ctx, count).await?;
        }
        Ok(())
    }

    /// Map recent-file references to local paths
    async fn local_paths(&self, uris: Vec<String>) -> zbus::fdo::Result<Vec<String>> {
        Self::resolve_local_paths(&uris)
    }

    /// Re-read the backing file
    async fn reload(
        &self,
        #[zbus(signal_context)] ctx: SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let count = self.reload_store().await;
        Self::history_changed(&ctx, count).await?;
        Ok(())
    }

    // === Signals ===

    /// Signal emitted when the history changes
    #[zbus(signal)]
    async fn history_changed(ctx: &SignalContext<'_>, count: u32) -> zbus::Result<()>;
}

/// Run the D-Bus service until interrupted
pub async fn run_service(store: RecentFilesStore) -> Result<(), Box<dyn std::error::Error>> {
    let path = store.path().display().to_string();
    let entries = store.len();
    let service = RecentHistoryService::new(Arc::new(RwLock::new(store)));

    let _conn = connection::Builder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;

    tracing::info!(
        "D-Bus service running at {} on {} ({} entries from {})",
        OBJECT_PATH,
        SERVICE_NAME,
        entries,
        path
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> RecentHistoryService {
        let store = RecentFilesStore::new(dir.join("recenthistory.json"));
        RecentHistoryService::new(Arc::new(RwLock::new(store)))
    }

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        assert_eq!(service.record_open("/home/u/a.txt").await.unwrap(), (true, 1));
        assert_eq!(service.record_open("file:///home/u/b.txt").await.unwrap(), (true, 2));
        assert_eq!(service.record_open("/home/u/a.txt").await.unwrap(), (true, 2));
        assert_eq!(service.record_open("smb://server/x").await.unwrap(), (false, 2));

        let names: Vec<String> = service.snapshot().await.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_record_rejects_garbage() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        assert!(service.record_open("relative/path").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        service.record_open("/a").await.unwrap();
        service.record_open("/b").await.unwrap();

        let (removed, count) = service
            .remove(&["recent:///a".to_string(), "recent:///zzz".to_string()])
            .await
            .unwrap();
        assert_eq!((removed, count), (1, 1));

        assert!(service.remove(&["file:///b".to_string()]).await.is_err());

        assert_eq!(service.dispatch(HistoryEvent::ClearRequested).await, (1, 0));
        assert!(service.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_reports_every_removed_entry() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        for path in ["/a", "/b", "/c"] {
            service.record_open(path).await.unwrap();
        }

        let uris = ["recent:///a", "recent:///c", "recent:///a"].map(String::from);
        assert_eq!(service.remove(&uris).await.unwrap(), (2, 1));
        assert_eq!(service.remove(&uris).await.unwrap(), (0, 1));
    }

    #[tokio::test]
    async fn test_record_keeps_trailing_space() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        assert_eq!(service.record_open("/tmp/report ").await.unwrap(), (true, 1));
        let info = service.snapshot().await;
        assert_eq!(info[0].url, "recent:///tmp/report%20");
        assert_eq!(info[0].path, "/tmp/report ");
    }

    #[tokio::test]
    async fn test_record_recent_keeps_raw_path_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let service = service(dir.path());
        let path = std::path::Path::new(OsStr::from_bytes(b"/tmp/caf\xe9.txt"));
        let url = RecentUrl::from_local_path(path).unwrap();

        assert_eq!(service.record_recent(&url).await.unwrap(), (true, 1));
        assert_eq!(service.record_recent(&url).await.unwrap(), (true, 1));

        let store = service.store.read().await;
        assert!(store.contains(&url));
        assert_eq!(store.enumerate()[0].url.to_local_path().unwrap(), path);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_changes() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        service.record_open("/a").await.unwrap();

        let mut other = RecentFilesStore::open(dir.path().join("recenthistory.json"));
        other.add_opened_file(&url::Url::parse("file:///b").unwrap()).unwrap();

        assert_eq!(service.reload_store().await, 2);
    }

    #[test]
    fn test_local_paths() {
        let paths = RecentHistoryService::resolve_local_paths(&[
            "recent:///home/u/a%20b.txt".to_string(),
            "recent:///c".to_string(),
        ])
        .unwrap();
        assert_eq!(paths, vec!["/home/u/a b.txt", "/c"]);

        assert!(RecentHistoryService::resolve_local_paths(&["nope".to_string()]).is_err());
    }
}
