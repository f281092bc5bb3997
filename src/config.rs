//! Startup configuration: resolved paths, HTTP settings and the collection list.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::models::CollectionSpec;

pub const COLLECTIONS_FILE: &str = "collections.json";
pub const KEYS_FILE: &str = "keys.txt";
pub const CONTROLS_FILE: &str = "controls.json";
pub const CACHE_DIR: &str = "cache";
pub const LOG_FILE: &str = "app.log";
pub const CRASH_FILE: &str = "crash.log";

/// Mount point of the device's main storage.
pub const DEVICE_STORAGE_ROOT: &str = "/roms";
pub const DEFAULT_ARCHIVE_URL: &str = "https://archive.org";
pub const DEFAULT_JOYSTICK_DEVICE: &str = "/dev/input/js0";
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} is missing", .0.display())]
    Missing(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} lists no collections", .0.display())]
    Empty(PathBuf),
}

/// Settings resolved once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the collection list, credentials, controls, cache and log.
    pub home: PathBuf,
    pub storage_root: PathBuf,
    pub archive_url: String,
    pub device: PathBuf,
    /// Accept any TLS certificate. Only for devices whose trust store is too old.
    pub insecure_tls: bool,
    pub stall_timeout: Duration,
}

impl AppConfig {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            storage_root: default_storage_root(),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            device: PathBuf::from(DEFAULT_JOYSTICK_DEVICE),
            insecure_tls: false,
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
        }
    }

    pub fn collections_file(&self) -> PathBuf {
        self.home.join(COLLECTIONS_FILE)
    }

    pub fn keys_file(&self) -> PathBuf {
        self.home.join(KEYS_FILE)
    }

    pub fn controls_file(&self) -> PathBuf {
        self.home.join(CONTROLS_FILE)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home.join(CACHE_DIR)
    }

    pub fn crash_file(&self) -> PathBuf {
        self.home.join(CRASH_FILE)
    }

    pub fn destination_dir(&self, collection: &CollectionSpec) -> PathBuf {
        self.storage_root.join(&collection.local_folder)
    }
}

/// `/roms` when the device mount exists, the working directory otherwise.
pub fn default_storage_root() -> PathBuf {
    let device_root = Path::new(DEVICE_STORAGE_ROOT);
    if device_root.exists() {
        device_root.to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

/// Directory containing the running executable, falling back to the working directory.
pub fn default_home() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_collections(path: &Path) -> Result<Vec<CollectionSpec>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let collections: Vec<CollectionSpec> =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if collections.is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }

    info!(count = collections.len(), "Loaded collections");
    Ok(collections)
}

/// Builds the `Authorization` value from a two-line key file.
///
/// Returns `None` when the file is absent, unreadable or has fewer than two lines.
pub fn load_credentials(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let mut lines = content.lines();
    let access = lines.next()?.trim();
    let secret = lines.next()?.trim();
    debug!(path = %path.display(), "Using stored credentials");
    Some(format!("LOW {access}:{secret}"))
}
