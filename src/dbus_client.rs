//! # D-Bus Client Module
//!
//! High-level client for a running recent history service. The CLI uses it
//! for one-shot commands so the service's in-memory history stays the one
//! source of truth while it is running.
//!
//! ## Usage
//!
//! ```ignore
//! let client = RecentHistoryClient::connect().await?;
//! client.file_opened("/home/user/notes.txt").await?;
//! for info in client.enumerate().await? {
//!     println!("{} {}", info.last_opened, info.path);
//! }
//! ```

use zbus::{proxy, Connection};

use crate::info::RecentFileInfo;
use crate::service::SERVICE_NAME;

/// D-Bus proxy for the recent history service
#[proxy(
    interface = "io.github.recent_history.RecentHistory1",
    default_service = "io.github.recent_history.RecentHistory1",
    default_path = "/io/github/recent_history/RecentHistory1"
)]
trait RecentHistory {
    /// Record an opened file
    async fn file_opened(&self, uri: &str) -> zbus::Result<bool>;

    /// Forget the given entries
    async fn remove_recent_files(&self, uris: &[String]) -> zbus::Result<u32>;

    /// Forget every entry
    async fn clear_recent_files(&self) -> zbus::Result<()>;

    /// List entries in insertion order
    async fn enumerate(&self) -> zbus::Result<Vec<RecentFileInfo>>;

    /// Open an entry with its default application
    async fn open_recent_file(&self, uri: &str) -> zbus::Result<()>;

    /// Map entries to local paths
    async fn local_paths(&self, uris: &[String]) -> zbus::Result<Vec<String>>;

    /// Re-read the backing file
    async fn reload(&self) -> zbus::Result<()>;

    // === Signals ===

    /// Signal emitted when the history changes
    #[zbus(signal)]
    async fn history_changed(&self, count: u32) -> zbus::Result<()>;
}

/// High-level client for the recent history service
pub struct RecentHistoryClient {
    proxy: RecentHistoryProxy<'static>,
}

impl RecentHistoryClient {
    /// Connect to the service
    ///
    /// Returns an error if the session bus is unreachable
    pub async fn connect() -> zbus::Result<Self> {
        let connection = Connection::session().await?;
        let proxy = RecentHistoryProxy::new(&connection).await?;
        Ok(Self { proxy })
    }

    /// Record an opened file (absolute path or URI). `false` if ignored.
    pub async fn file_opened(&self, uri: &str) -> zbus::Result<bool> {
        self.proxy.file_opened(uri).await
    }

    /// Forget the given recent-file references, returning how many went away
    pub async fn remove_recent_files(&self, uris: &[String]) -> zbus::Result<u32> {
        self.proxy.remove_recent_files(uris).await
    }

    /// Forget every entry
    pub async fn clear_recent_files(&self) -> zbus::Result<()> {
        self.proxy.clear_recent_files().await
    }

    /// List entries in insertion order
    pub async fn enumerate(&self) -> zbus::Result<Vec<RecentFileInfo>> {
        self.proxy.enumerate().await
    }

    /// Open an entry with its default application
    pub async fn open_recent_file(&self, uri: &str) -> zbus::Result<()> {
        self.proxy.open_recent_file(uri).await
    }

    /// Map recent-file references to local paths
    pub async fn local_paths(&self, uris: &[String]) -> zbus::Result<Vec<String>> {
        self.proxy.local_paths(uris).await
    }

    /// Ask the service to re-read its backing file
    pub async fn reload(&self) -> zbus::Result<()> {
        self.proxy.reload().await
    }

    /// Subscribe to history changed signals
    pub async fn subscribe_history_changed(&self) -> zbus::Result<HistoryChangedStream<'static>> {
        self.proxy.receive_history_changed().await
    }
}

/// Check if the service is available (its name is owned on the session bus)
pub async fn is_service_available() -> bool {
    if let Ok(connection) = Connection::session().await {
        connection
            .call_method(
                Some("org.freedesktop.DBus"),
                "/org/freedesktop/DBus",
                Some("org.freedesktop.DBus"),
                "NameHasOwner",
                &SERVICE_NAME,
            )
            .await
            .and_then(|reply| reply.body().deserialize::<bool>())
            .unwrap_or(false)
    } else {
        false
    }
}
