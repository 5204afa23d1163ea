//! Error types for cookie loading, saving and lookup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while handling cookies.
#[derive(Debug, Error)]
pub enum CookieError {
    /// The cookie file exists but is not a valid Netscape-format file.
    #[error("invalid cookie file {}: {reason}", path.display())]
    Load {
        /// The cookie file that failed to parse.
        path: PathBuf,
        /// Description of what was wrong (cookie values redacted).
        reason: String,
    },

    /// The cookie file could not be read or written.
    #[error("IO error on cookie file {}: {source}", path.display())]
    Io {
        /// The cookie file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No usable session cookie exists for the requested origin.
    ///
    /// This is an expected condition that should trigger (re-)authentication.
    #[error("no shibsession cookie found for {origin:?}")]
    NotFound {
        /// Network location (`host[:port]`) that was searched for.
        origin: String,
    },

    /// The target URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl CookieError {
    /// Creates a load (format) error.
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for the recoverable "no session cookie" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
