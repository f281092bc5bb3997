//! Error types for listing fetches and downloads.
//!
//! Every failure a fetch or download can produce maps onto an [`ErrorKind`],
//! whose short label is what the browser shows the user.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Classification shown to the user for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ScrapeFailed,
    ApiFailed,
    EmptyLibrary,
    WriteError,
    DownloadError,
    Cancelled,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::ScrapeFailed => "Scrape Failed",
            Self::ApiFailed => "API Failed",
            Self::EmptyLibrary => "Empty Lib",
            Self::WriteError => "Write Error",
            Self::DownloadError => "DL Error",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Underlying cause of a failed request.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stalled for {0} seconds")]
    Stalled(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from listing fetches. The cache is never modified on error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("scrape of {url} failed: {source}")]
    ScrapeFailed {
        url: String,
        #[source]
        source: RequestFailure,
    },

    #[error("metadata request for {identifier} failed: {source}")]
    ApiFailed {
        identifier: String,
        #[source]
        source: RequestFailure,
    },

    #[error("metadata for {identifier} has no file list")]
    EmptyLibrary { identifier: String },
}

impl FetchError {
    pub fn scrape(url: impl Into<String>, source: impl Into<RequestFailure>) -> Self {
        Self::ScrapeFailed {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn api(identifier: impl Into<String>, source: impl Into<RequestFailure>) -> Self {
        Self::ApiFailed {
            identifier: identifier.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ScrapeFailed { .. } => ErrorKind::ScrapeFailed,
            Self::ApiFailed { .. } => ErrorKind::ApiFailed,
            Self::EmptyLibrary { .. } => ErrorKind::EmptyLibrary,
        }
    }
}

/// Errors from a single download. Partial files are removed before these are returned.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot create {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download from {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: RequestFailure,
    },

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn transfer(url: impl Into<String>, source: impl Into<RequestFailure>) -> Self {
        Self::Transfer {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Write { .. } => ErrorKind::WriteError,
            Self::Transfer { .. } => ErrorKind::DownloadError,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
