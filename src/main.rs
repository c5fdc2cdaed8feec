//! # Recent History
//!
//! Tracks the files a desktop user recently opened, remembers when each was
//! last opened, and keeps the list in a small JSON file. A file manager or
//! any other desktop component reports opens over D-Bus and reads the list
//! back for its "Recent" view.
//!
//! ## Architecture
//! - `recent_url.rs` - `recent:` references wrapping local paths
//! - `store.rs` - The recent files store and its JSON backing file
//! - `events.rs` - File-opened / remove / clear events applied to the store
//! - `info.rs` - Display rows built from store entries
//! - `service.rs` - D-Bus service owning the store
//! - `dbus_client.rs` - Client proxy used by the one-shot commands
//! - `config.rs` - User configuration, file locations, legacy migration
//! - `error.rs` - Store error types
//!
//! ## CLI Usage
//! - No arguments / `--service`: Run the D-Bus service
//! - `--list`, `-l`: Print the recent files
//! - `--add`, `-a <path|uri>`: Record an opened file
//! - `--remove`, `-r <uri|path>...`: Forget entries
//! - `--clear`, `-c`: Forget everything
//! - `--open`, `-o <uri|path>`: Open an entry with its default application
//! - `--set-history-file [path]`: Move the history file (takes effect on next start)
//! - `--help`, `-h`: Show help message

mod config;
mod dbus_client;
mod error;
mod events;
mod info;
mod recent_url;
mod service;
mod store;

use std::error::Error;
use std::path::{Path, PathBuf};

use futures::StreamExt;

use config::{Config, ConfigPathResolver, XdgConfigPaths};
use dbus_client::RecentHistoryClient;
use events::HistoryEvent;
use info::RecentFileInfo;
use recent_url::{parse_location, RecentUrl};
use store::{RecentFilesStore, STORE_NAME};

/// Name the history had in the old cache location
const LEGACY_CACHE_NAME: &str = "recentHistory";

type CliResult = Result<(), Box<dyn Error>>;

/// Application entry point, dispatching on the first argument.
///
/// The service is the primary mode. One-shot commands talk to a running
/// service when there is one and edit the backing file directly otherwise.
fn main() {
    let config = Config::load();
    init_logging(&config);

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("recent-history");
    let command = args.get(1).map(String::as_str).unwrap_or("--service");
    let rest = args.get(2..).unwrap_or_default();

    let result = match command {
        "--help" | "-h" => {
            print_help(program);
            Ok(())
        }
        "--version" | "-v" => {
            println!("recent-history {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "--set-history-file" => set_history_file(config.clone(), rest),
        "--service" | "--list" | "-l" | "--add" | "-a" | "--remove" | "-r" | "--clear" | "-c"
        | "--open" | "-o" | "--paths" | "--reload" | "--watch" => {
            run_command(&config, command, rest)
        }
        _ => {
            eprintln!("Unknown argument: {}", command);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs to stderr. `RUST_LOG` wins over the configured level.
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints help message
fn print_help(program: &str) {
    println!("Recent files history for the desktop\n");
    println!("Usage: {} [OPTIONS]\n", program);
    println!("Options:");
    println!("  (none), --service          Run the D-Bus service");
    println!("  --list, -l                 List recent files");
    println!("  --add, -a <path|uri>       Record that a file was opened");
    println!("  --remove, -r <entry>...    Forget entries (recent:// URIs or paths)");
    println!("  --clear, -c                Forget all entries");
    println!("  --open, -o <entry>         Open an entry with its default application");
    println!("  --paths <entry>...         Print the local paths of entries");
    println!("  --reload                   Make the running service re-read its file");
    println!("  --watch                    Print changes reported by the running service");
    println!("  --set-history-file [path]  Store the history elsewhere (no path: default)");
    println!("  --version, -v              Show version information");
    println!("  --help, -h                 Show this help message");
    println!();

    let location = history_path(&XdgConfigPaths::new(&Config::load()))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<no config directory>".to_string());
    println!("The history is kept in {}.", location);
}

fn history_path(resolver: &impl ConfigPathResolver) -> Option<PathBuf> {
    resolver.config_path(STORE_NAME)
}

/// Opens the process' store: resolves the backing file, migrates the legacy
/// cache copy if needed, then loads.
fn open_store(config: &Config) -> Result<RecentFilesStore, Box<dyn Error>> {
    let resolver = XdgConfigPaths::new(config);
    let path = history_path(&resolver)
        .ok_or_else(|| error::StoreError::NoConfigPath(STORE_NAME.to_string()))?;

    config::migrate_config_file_from_cache(LEGACY_CACHE_NAME, &path);
    RecentFilesStore::from_resolver(&resolver).map_err(Into::into)
}

/// Saves a new `history_file` setting. Without a path the default location
/// is used again.
fn set_history_file(mut config: Config, args: &[String]) -> CliResult {
    config.history_file = match args {
        [] => None,
        [path] => Some(std::env::current_dir()?.join(path).to_string_lossy().to_string()),
        _ => return Err("--set-history-file takes at most one path".into()),
    };
    config.save()?;

    match &config.history_file {
        Some(path) => println!("Recent history will be kept in {}", path),
        None => println!("Recent history will be kept in the default location"),
    }
    Ok(())
}

fn run_command(config: &Config, command: &str, args: &[String]) -> CliResult {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(execute(config, command, args))
}

async fn execute(config: &Config, command: &str, args: &[String]) -> CliResult {
    if command == "--service" {
        let store = open_store(config)?;
        return service::run_service(store).await;
    }

    let mut backend = Backend::connect(config).await?;
    match command {
        "--list" | "-l" => {
            let infos = backend.enumerate().await?;
            if infos.is_empty() {
                println!("No recent files.");
            }
            for info in infos {
                print_info(&info);
            }
            Ok(())
        }
        "--add" | "-a" => {
            let location = single_arg(args, command)?;
            if backend.file_opened(&location).await? {
                println!("Recorded {}", location);
            } else {
                println!("Ignored {} (not a local file)", location);
            }
            Ok(())
        }
        "--remove" | "-r" => {
            let urls = recent_args(args, command)?;
            let removed = backend.remove(&urls).await?;
            println!("Removed {} of {} entries", removed, urls.len());
            Ok(())
        }
        "--clear" | "-c" => {
            backend.clear().await?;
            println!("Recent history cleared");
            Ok(())
        }
        "--open" | "-o" => {
            let url = recent_args(args, command)?
                .into_iter()
                .next()
                .ok_or("missing entry")?;
            backend.open(&url).await
        }
        "--paths" => {
            for path in backend.local_paths(&recent_args(args, command)?).await? {
                println!("{}", path);
            }
            Ok(())
        }
        "--reload" => backend.reload().await,
        "--watch" => backend.watch().await,
        _ => unreachable!("dispatched in main"),
    }
}

fn print_info(info: &RecentFileInfo) {
    let stamp = if info.last_opened.is_empty() { "-" } else { info.last_opened.as_str() };
    let marker = if info.exists() { " " } else { "!" };
    println!("{:<16} {}{}", stamp, marker, info.path);
}

/// Turns a command line argument into a location: absolute paths and URIs
/// pass through, relative paths are taken from the current directory.
fn resolve_location(arg: &str) -> Result<String, Box<dyn Error>> {
    if parse_location(arg).is_some() {
        return Ok(arg.to_string());
    }
    let absolute = std::env::current_dir()?.join(Path::new(arg));
    Ok(absolute.to_string_lossy().to_string())
}

/// Accepts either a `recent:` reference or something naming a local file.
fn to_recent_url(arg: &str) -> Result<RecentUrl, Box<dyn Error>> {
    if let Ok(url) = arg.parse::<RecentUrl>() {
        return Ok(url);
    }
    let location = resolve_location(arg)?;
    parse_location(&location)
        .as_ref()
        .and_then(RecentUrl::from_file_url)
        .ok_or_else(|| format!("not a local file or recent entry: '{arg}'").into())
}

fn single_arg(args: &[String], command: &str) -> Result<String, Box<dyn Error>> {
    match args {
        [arg] => resolve_location(arg),
        _ => Err(format!("{command} takes exactly one argument").into()),
    }
}

fn recent_args(args: &[String], command: &str) -> Result<Vec<RecentUrl>, Box<dyn Error>> {
    if args.is_empty() {
        return Err(format!("{command} needs at least one entry").into());
    }
    args.iter().map(|arg| to_recent_url(arg)).collect()
}

/// Where one-shot commands are applied.
enum Backend {
    /// A running service owns the history
    Service(RecentHistoryClient),
    /// No service: edit the backing file directly
    Local(RecentFilesStore),
}

impl Backend {
    async fn connect(config: &Config) -> Result<Self, Box<dyn Error>> {
        if dbus_client::is_service_available().await {
            match RecentHistoryClient::connect().await {
                Ok(client) => return Ok(Self::Service(client)),
                Err(e) => tracing::warn!("Service unreachable, using the file directly: {e}"),
            }
        }
        tracing::debug!("No running service, using the file directly");
        Ok(Self::Local(open_store(config)?))
    }

    async fn enumerate(&self) -> Result<Vec<RecentFileInfo>, Box<dyn Error>> {
        match self {
            Self::Service(client) => Ok(client.enumerate().await?),
            Self::Local(store) => Ok(info::describe(&store.enumerate())),
        }
    }

    async fn file_opened(&mut self, location: &str) -> Result<bool, Box<dyn Error>> {
        match self {
            Self::Service(client) => Ok(client.file_opened(location).await?),
            Self::Local(_) => {
                let url = parse_location(location)
                    .ok_or_else(|| format!("not a location: '{location}'"))?;
                Ok(self.apply(HistoryEvent::FileOpened(url))? > 0)
            }
        }
    }

    async fn remove(&mut self, urls: &[RecentUrl]) -> Result<u32, Box<dyn Error>> {
        match self {
            Self::Service(client) => {
                let uris: Vec<String> = urls.iter().map(ToString::to_string).collect();
                Ok(client.remove_recent_files(&uris).await?)
            }
            Self::Local(_) => {
                let removed = self.apply(HistoryEvent::RemoveRequested(urls.to_vec()))?;
                Ok(removed as u32)
            }
        }
    }

    async fn clear(&mut self) -> CliResult {
        match self {
            Self::Service(client) => Ok(client.clear_recent_files().await?),
            Self::Local(_) => self.apply(HistoryEvent::ClearRequested).map(|_| ()),
        }
    }

    async fn open(&mut self, url: &RecentUrl) -> CliResult {
        match self {
            Self::Service(client) => Ok(client.open_recent_file(url.as_str()).await?),
            Self::Local(_) => {
                let path = url
                    .to_local_path()
                    .ok_or_else(|| format!("no local path for {url}"))?;
                open::that_detached(&path)?;
                let file_url = url
                    .to_file_url()
                    .ok_or_else(|| format!("no local path for {url}"))?;
                self.apply(HistoryEvent::FileOpened(file_url)).map(|_| ())
            }
        }
    }

    async fn local_paths(&self, urls: &[RecentUrl]) -> Result<Vec<String>, Box<dyn Error>> {
        match self {
            Self::Service(client) => {
                let uris: Vec<String> = urls.iter().map(ToString::to_string).collect();
                Ok(client.local_paths(&uris).await?)
            }
            Self::Local(_) => urls
                .iter()
                .map(|url| {
                    url.to_local_path()
                        .map(|p| p.to_string_lossy().to_string())
                        .ok_or_else(|| format!("no local path for {url}").into())
                })
                .collect(),
        }
    }

    async fn reload(&self) -> CliResult {
        match self {
            Self::Service(client) => Ok(client.reload().await?),
            Self::Local(_) => Err("no running service to reload".into()),
        }
    }

    async fn watch(&self) -> CliResult {
        let Self::Service(client) = self else {
            return Err("no running service to watch".into());
        };

        let mut stream = client.subscribe_history_changed().await?;
        println!("Watching recent history (Ctrl+C to stop)");
        while let Some(signal) = stream.next().await {
            let args = signal.args()?;
            println!("History changed: {} entries", args.count());
        }
        Ok(())
    }

    /// Applies an event to the file directly and returns how many entries
    /// it touched. Save failures are logged, the command itself still succeeds.
    fn apply(&mut self, event: HistoryEvent) -> Result<usize, Box<dyn Error>> {
        let Self::Local(store) = self else {
            return Err("not a local backend".into());
        };
        let applied = event.apply(store);
        if let Some(e) = &applied.save_error {
            tracing::warn!("{e}");
        }
        Ok(applied.touched)
    }
}
