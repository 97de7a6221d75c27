//! Error types for pagewatch_core.
//!
//! Hand-rolls `Display`/`source()` for the error enum rather than reaching
//! for `thiserror`'s derive, matching `spider_agent::error::AgentError`'s
//! style even though `thiserror` is available elsewhere in the dependency
//! graph.

use std::fmt;

/// Core error types for the capture and versioning engine.
#[derive(Debug)]
pub enum PageWatchError {
    /// The renderer could not be reached after retries.
    RendererUnavailable(String),
    /// The renderer did not respond before the deadline.
    RendererTimeout,
    /// The renderer rejected the request (4xx).
    RendererRejected {
        /// HTTP status code returned by the renderer.
        status: u16,
        /// Response body or reason, if any.
        message: String,
    },
    /// A capture for this competitor is already in progress.
    CaptureInProgress,
    /// Monitoring is disabled for this competitor (scheduler-only check).
    MonitoringDisabled,
    /// A concurrent writer already created the next version.
    VersionConflict {
        /// Competitor the conflict occurred on.
        competitor_id: String,
        /// Version number that was already taken.
        version_number: i64,
    },
    /// The version chain is broken and the requested version cannot be rebuilt.
    ReconstructionFailed(String),
    /// The snapshot store is unreachable or failed a query.
    StoreUnavailable(String),
    /// The referenced competitor does not exist.
    CompetitorNotFound(String),
    /// The referenced snapshot does not exist.
    SnapshotNotFound {
        /// Competitor id.
        competitor_id: String,
        /// Version number that was not found.
        version_number: i64,
    },
    /// JSON serialization/deserialization error.
    Json(serde_json::Error),
    /// HTTP transport error from the renderer client.
    Http(reqwest::Error),
    /// IO error (used by the sqlite-backed store and the CLI).
    Io(std::io::Error),
    /// Database error from the sqlite-backed store.
    #[cfg(feature = "sqlite")]
    Database(sqlx::Error),
}

impl fmt::Display for PageWatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RendererUnavailable(msg) => write!(f, "renderer unavailable: {}", msg),
            Self::RendererTimeout => write!(f, "renderer request timed out"),
            Self::RendererRejected { status, message } => {
                write!(f, "renderer rejected request ({}): {}", status, message)
            }
            Self::CaptureInProgress => write!(f, "capture already in progress for this competitor"),
            Self::MonitoringDisabled => write!(f, "monitoring is disabled for this competitor"),
            Self::VersionConflict {
                competitor_id,
                version_number,
            } => write!(
                f,
                "version conflict for competitor {}: version {} already exists",
                competitor_id, version_number
            ),
            Self::ReconstructionFailed(msg) => write!(f, "version reconstruction failed: {}", msg),
            Self::StoreUnavailable(msg) => write!(f, "snapshot store unavailable: {}", msg),
            Self::CompetitorNotFound(id) => write!(f, "competitor not found: {}", id),
            Self::SnapshotNotFound {
                competitor_id,
                version_number,
            } => write!(
                f,
                "snapshot not found: competitor {} version {}",
                competitor_id, version_number
            ),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::Http(e) => write!(f, "HTTP error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
            #[cfg(feature = "sqlite")]
            Self::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for PageWatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Io(e) => Some(e),
            #[cfg(feature = "sqlite")]
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PageWatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::RendererTimeout
        } else {
            Self::Http(e)
        }
    }
}

impl From<serde_json::Error> for PageWatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<std::io::Error> for PageWatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for PageWatchError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

/// Result type for core operations.
pub type PageWatchResult<T> = Result<T, PageWatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        let err = PageWatchError::CaptureInProgress;
        assert_eq!(format!("{}", err), "capture already in progress for this competitor");

        let err = PageWatchError::MonitoringDisabled;
        assert_eq!(format!("{}", err), "monitoring is disabled for this competitor");

        let err = PageWatchError::VersionConflict {
            competitor_id: "c1".into(),
            version_number: 4,
        };
        assert_eq!(
            format!("{}", err),
            "version conflict for competitor c1: version 4 already exists"
        );

        let err = PageWatchError::RendererRejected {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(format!("{}", err), "renderer rejected request (403): forbidden");

        let err = PageWatchError::ReconstructionFailed("missing diff chain link".into());
        assert_eq!(
            format!("{}", err),
            "version reconstruction failed: missing diff chain link"
        );
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PageWatchError = json_err.into();
        assert!(format!("{}", err).starts_with("JSON error:"));
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = PageWatchError::Json(json_err);
        assert!(err.source().is_some());

        let err = PageWatchError::CaptureInProgress;
        assert!(err.source().is_none());
    }
}
