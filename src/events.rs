//! Inbound history events and their dispatch onto a store.
//!
//! The host application owns one [`RecentFilesStore`] and feeds it events
//! from whatever produces them (the D-Bus service here). Callers serialize
//! dispatch themselves; the store is not shared behind a global.

use url::Url;

use crate::error::StoreError;
use crate::recent_url::RecentUrl;
use crate::store::RecentFilesStore;

/// Something happened that the recent history should reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A file was opened somewhere in the desktop
    FileOpened(Url),
    /// The user asked to forget these entries
    RemoveRequested(Vec<RecentUrl>),
    /// The user asked to forget everything
    ClearRequested,
}

/// What applying an event did to the store.
#[derive(Debug)]
pub struct Applied {
    /// Entries recorded, refreshed or forgotten
    pub touched: usize,
    /// Set when the in-memory change could not be persisted
    pub save_error: Option<StoreError>,
}

impl Applied {
    fn saved(touched: usize) -> Self {
        Self {
            touched,
            save_error: None,
        }
    }

    fn unsaved(touched: usize, error: StoreError) -> Self {
        Self {
            touched,
            save_error: Some(error),
        }
    }
}

impl HistoryEvent {
    /// Applies the event and reports how many entries it touched (a
    /// timestamp-only refresh counts as one).
    ///
    /// In-memory changes stick even if saving fails; `save_error` reports
    /// the lost durability.
    pub fn apply(self, store: &mut RecentFilesStore) -> Applied {
        let before = store.len();
        match self {
            Self::FileOpened(url) => match store.add_opened_file(&url) {
                Ok(recorded) => Applied::saved(usize::from(recorded)),
                // ignored locations never reach the save
                Err(e) => Applied::unsaved(1, e),
            },
            Self::RemoveRequested(urls) => match store.remove_recent_files(&urls) {
                Ok(removed) => Applied::saved(removed),
                Err(e) => Applied::unsaved(before - store.len(), e),
            },
            Self::ClearRequested => match store.clear_recent_files() {
                Ok(()) => Applied::saved(before),
                Err(e) => Applied::unsaved(before, e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_dispatch_sequence() {
        let dir = tempdir().unwrap();
        let mut store = RecentFilesStore::new(dir.path().join("recenthistory.json"));
        let a = Url::parse("file:///home/u/a.txt").unwrap();
        let b = Url::parse("file:///home/u/b.txt").unwrap();
        let c = Url::parse("file:///home/u/c.txt").unwrap();

        assert_eq!(HistoryEvent::FileOpened(a.clone()).apply(&mut store).touched, 1);
        assert_eq!(HistoryEvent::FileOpened(b).apply(&mut store).touched, 1);
        assert_eq!(HistoryEvent::FileOpened(c).apply(&mut store).touched, 1);
        assert_eq!(HistoryEvent::FileOpened(a).apply(&mut store).touched, 1);
        assert_eq!(store.len(), 3);

        let recent_a = RecentUrl::from_local_path(Path::new("/home/u/a.txt")).unwrap();
        let recent_b = RecentUrl::from_local_path(Path::new("/home/u/b.txt")).unwrap();
        let missing = RecentUrl::from_local_path(Path::new("/home/u/zzz")).unwrap();
        let applied = HistoryEvent::RemoveRequested(vec![recent_a.clone(), recent_b, missing])
            .apply(&mut store);
        assert_eq!(applied.touched, 2);
        assert!(applied.save_error.is_none());

        let applied = HistoryEvent::RemoveRequested(vec![recent_a]).apply(&mut store);
        assert_eq!(applied.touched, 0);
        assert_eq!(store.len(), 1);

        assert_eq!(HistoryEvent::ClearRequested.apply(&mut store).touched, 1);
        assert_eq!(HistoryEvent::ClearRequested.apply(&mut store).touched, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remote_file_opened_is_ignored() {
        let dir = tempdir().unwrap();
        let mut store = RecentFilesStore::new(dir.path().join("recenthistory.json"));
        let remote = Url::parse("sftp://host/home/u/a.txt").unwrap();

        let applied = HistoryEvent::FileOpened(remote).apply(&mut store);
        assert_eq!(applied.touched, 0);
        assert!(applied.save_error.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_counts_survive_a_failed_save() {
        let dir = tempdir().unwrap();
        // the parent is a regular file, so every save fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut store = RecentFilesStore::new(blocker.join("recenthistory.json"));

        let applied =
            HistoryEvent::FileOpened(Url::parse("file:///a").unwrap()).apply(&mut store);
        assert_eq!(applied.touched, 1);
        assert!(applied.save_error.is_some());
        HistoryEvent::FileOpened(Url::parse("file:///b").unwrap()).apply(&mut store);

        let a = RecentUrl::from_local_path(Path::new("/a")).unwrap();
        let applied = HistoryEvent::RemoveRequested(vec![a]).apply(&mut store);
        assert_eq!(applied.touched, 1);
        assert!(applied.save_error.is_some());

        let applied = HistoryEvent::ClearRequested.apply(&mut store);
        assert_eq!(applied.touched, 1);
        assert!(applied.save_error.is_some());
        assert!(store.is_empty());
    }
}
