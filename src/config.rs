//! Application configuration.
//!
//! Connection settings come from the environment (or a `.env` file, or CLI
//! flags) and are resolved once into [`Settings`], which is passed to every
//! component that needs it.
//!
//! Tuning knobs live in an optional TOML file at:
//! 1. `$IMAPSAVE_CONFIG` (environment variable)
//! 2. `~/.config/imapsave/config.toml` (Linux/macOS)
//!    `%APPDATA%\imapsave\config.toml` (Windows)
//! 3. Built-in defaults

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SaveError};
use crate::model::batch::DEFAULT_BATCH_SIZE;

/// Default port for IMAP over implicit TLS.
pub const DEFAULT_IMAPS_PORT: u16 = 993;

/// Contents of the optional TOML configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Fetch tuning.
    pub fetch: FetchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Fetch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of messages per metadata fetch.
    pub batch_size: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A `host:port` pair for the IMAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    /// Parse `host:port`. The port defaults to 993 when omitted.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SaveError::Config("IMAP_SERVER is empty".into()));
        }

        let (host, port) = match s.rsplit_once(':') {
            // Bare IPv6 literals are not supported without brackets
            Some((host, port)) if !host.contains(':') || host.ends_with(']') => {
                let port = port.parse::<u16>().map_err(|_| {
                    SaveError::Config(format!("invalid port in IMAP_SERVER '{s}'"))
                })?;
                (host, port)
            }
            _ => (s, DEFAULT_IMAPS_PORT),
        };

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(SaveError::Config(format!("missing host in IMAP_SERVER '{s}'")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Fully resolved run settings.
#[derive(Clone)]
pub struct Settings {
    pub server: ServerAddr,
    pub username: String,
    pub password: String,
    pub folder: String,
    pub destination_dir: PathBuf,
    pub batch_size: u32,
}

impl Settings {
    /// Validate raw values and build the settings.
    pub fn new(
        server: &str,
        username: String,
        password: String,
        folder: String,
        destination_dir: PathBuf,
        batch_size: u32,
    ) -> Result<Self> {
        if username.is_empty() {
            return Err(SaveError::Config("IMAP_USERNAME is empty".into()));
        }
        if folder.is_empty() {
            return Err(SaveError::Config("IMAP_FOLDER is empty".into()));
        }
        if destination_dir.as_os_str().is_empty() {
            return Err(SaveError::Config("DESTINATION_DIR is empty".into()));
        }
        if batch_size == 0 {
            return Err(SaveError::Config("batch size must be at least 1".into()));
        }

        Ok(Self {
            server: ServerAddr::parse(server)?,
            username,
            password,
            folder,
            destination_dir,
            batch_size,
        })
    }
}

// Keep the password out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("folder", &self.folder)
            .field("destination_dir", &self.destination_dir)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load the TOML configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> FileConfig {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<FileConfig>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    FileConfig::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("IMAPSAVE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("imapsave").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &FileConfig) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imapsave")
}
