//! Centralized error types for imapsave.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the imapsave library.
///
/// Every variant is fatal for the run: the top-level handler in `main`
/// turns any of them into a non-zero exit status.
#[derive(Error, Debug)]
pub enum SaveError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The processed-UID ledger contains a line that is not a UID.
    #[error("Corrupt ledger '{path}' at line {line}: {content:?} is not a message UID")]
    LedgerParse {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// TCP connection to the server failed.
    #[error("Could not connect to {server}: {source}")]
    Connect {
        server: String,
        source: std::io::Error,
    },

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("Login failed for '{user}': {reason}")]
    Login { user: String, reason: String },

    /// The configured folder could not be selected.
    #[error("Cannot select folder '{folder}': {reason}")]
    Select { folder: String, reason: String },

    /// A FETCH command failed or the response stream broke.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// LOGOUT failed.
    #[error("Logout failed: {0}")]
    Logout(String),

    /// The server answered a body fetch without any body content.
    #[error("Server returned no body for message UID {0}")]
    MissingBody(u32),

    /// The message body could not be parsed as MIME.
    #[error("Cannot parse message UID {uid}")]
    Parse { uid: u32 },
}

/// Convenience alias for `Result<T, SaveError>`.
pub type Result<T> = std::result::Result<T, SaveError>;

impl SaveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an `async-imap` error raised while fetching.
    pub fn fetch(err: impl std::fmt::Display) -> Self {
        Self::Fetch(err.to_string())
    }
}
