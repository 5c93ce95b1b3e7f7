//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`
//! ([`TransportError`], [`ServiceError`], [`MetadataError`]), while the CLI
//! uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: top-level enum used by the download flows
//! - [`FailureKind`]: the classification stored in a failure record; every
//!   [`Error`] maps onto exactly one kind
//!
//! # Example
//!
//! ```ignore
//! use zvuk_dl::error::{Error, Result};
//!
//! async fn fetch(client: &ServiceClient, id: u64) -> Result<TrackRecord> {
//!     Ok(client.track(id).await?) // ServiceError auto-converts
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::metadata::MetadataError;
use crate::quality::Tier;
use crate::service::ServiceError;
use crate::transport::TransportError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Filesystem error outside of streaming
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No acceptable tier under the fallback policy
    #[error("Track {track_id}: requested {requested} is unavailable{}", available_suffix(.available))]
    QualityUnavailable {
        track_id: u64,
        requested: Tier,
        available: Vec<Tier>,
    },
}

fn available_suffix(available: &[Tier]) -> String {
    if available.is_empty() {
        " (nothing available)".to_string()
    } else {
        let names: Vec<&str> = available.iter().map(|t| t.api_name()).collect();
        format!(" (available: {})", names.join(", "))
    }
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classification recorded for a failed item.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Service(ServiceError::NotFound { .. }) => FailureKind::NotFound,
            Error::Service(ServiceError::Transport(e)) | Error::Transport(e) => {
                FailureKind::from_transport(e)
            }
            Error::Service(ServiceError::Malformed { .. }) => FailureKind::TransientNetwork,
            Error::Metadata(_) => FailureKind::TagWrite,
            Error::Io { .. } => FailureKind::Filesystem,
            Error::QualityUnavailable { .. } => FailureKind::QualityUnavailable,
        }
    }
}

/// Error classification carried by a failure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts and connection failures, after retries
    TransientNetwork,
    /// The service kept refusing with its anti-automation status
    Throttling,
    NotFound,
    QualityUnavailable,
    /// Tags could not be written; the audio file is kept
    TagWrite,
    Filesystem,
    Configuration,
}

impl FailureKind {
    fn from_transport(error: &TransportError) -> Self {
        match error {
            TransportError::Exhausted {
                throttled: true, ..
            } => FailureKind::Throttling,
            TransportError::Aborted { .. } => FailureKind::Filesystem,
            TransportError::InvalidUrl(_)
            | TransportError::InvalidHeader(_)
            | TransportError::Client(_) => FailureKind::Configuration,
            _ => FailureKind::TransientNetwork,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::TransientNetwork => "network",
            FailureKind::Throttling => "throttled",
            FailureKind::NotFound => "not found",
            FailureKind::QualityUnavailable => "quality unavailable",
            FailureKind::TagWrite => "tag write",
            FailureKind::Filesystem => "filesystem",
            FailureKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kind() {
        let err: Error = ServiceError::not_found("track", 7).into();
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert!(err.to_string().contains("track 7"));
    }

    #[test]
    fn test_throttled_exhaustion_kind() {
        let err: Error = ServiceError::Transport(TransportError::Exhausted {
            target: "/api/tiny/tracks".to_string(),
            attempts: 5,
            throttled: true,
            last_error: "throttled".to_string(),
        })
        .into();
        assert_eq!(err.kind(), FailureKind::Throttling);
    }

    #[test]
    fn test_plain_exhaustion_is_network() {
        let err: Error = TransportError::Exhausted {
            target: "x".to_string(),
            attempts: 5,
            throttled: false,
            last_error: "timeout".to_string(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::TransientNetwork);
    }

    #[test]
    fn test_quality_unavailable_display() {
        let err = Error::QualityUnavailable {
            track_id: 116136641,
            requested: Tier::Lossless,
            available: vec![Tier::High],
        };
        let msg = err.to_string();
        assert!(msg.contains("116136641"));
        assert!(msg.contains("available: high"));
        assert_eq!(err.kind(), FailureKind::QualityUnavailable);
    }

    #[test]
    fn test_io_error_is_filesystem() {
        let err = Error::io("/tmp/x", std::io::Error::other("disk full"));
        assert!(err.to_string().contains("/tmp/x"));
        assert_eq!(err.kind(), FailureKind::Filesystem);
    }

    #[test]
    fn test_metadata_error_is_tag_write() {
        let err: Error = MetadataError::InvalidTag("bad frame".to_string()).into();
        assert_eq!(err.kind(), FailureKind::TagWrite);
    }
}
