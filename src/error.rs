//! Error taxonomy shared by the index, sync engine and playback pipeline.
//!
//! Parse failures never show up here: a key that does not follow the naming
//! convention is skipped where it is encountered.

use std::time::Duration;

/// Failures of a single external transcoder run
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// The transcoder binary could not be started
    #[error("failed to spawn transcoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The transcoder ran but reported failure
    #[error("transcoder exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    /// Reading the source object failed while feeding the transcoder
    #[error("source stream failed: {0}")]
    Input(String),
    /// The transcoder did not finish in time and was killed
    #[error("transcoder timed out after {0:?}")]
    TimedOut(Duration),
    /// Local I/O on the transcoder pipes or output file failed
    #[error("transcoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The source recording does not exist in the store
    #[error("recording not found: {0}")]
    NotFound(String),
    /// Listing a prefix of the store failed
    #[error("failed to list '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: object_store::Error,
    },
    #[error("transcode failed for '{key}': {source}")]
    Transcode {
        key: String,
        #[source]
        source: TranscodeError,
    },
    /// Transcoding succeeded but the artifact could not be written back
    #[error("cache upload failed for '{key}': {source}")]
    CacheUpload {
        key: String,
        #[source]
        source: object_store::Error,
    },
    #[error("storage error for '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: object_store::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("requested range not satisfiable for length {length}")]
    RangeNotSatisfiable { length: u64 },
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Map a store error for `key`, keeping a missing object distinct
    pub fn from_store(key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => ArchiveError::NotFound(key.to_string()),
            other => ArchiveError::Storage {
                key: key.to_string(),
                source: other,
            },
        }
    }

    /// Pipeline stage the error belongs to, for operator-facing responses
    pub fn stage(&self) -> &'static str {
        match self {
            ArchiveError::NotFound(_) => "fetch_source",
            ArchiveError::Listing { .. } => "listing",
            ArchiveError::Transcode { .. } => "transcode",
            ArchiveError::CacheUpload { .. } => "persist_cache",
            ArchiveError::Storage { .. } => "storage",
            ArchiveError::Database(_) => "index",
            ArchiveError::Io(_) => "io",
            ArchiveError::InvalidRequest(_) => "request",
            ArchiveError::RangeNotSatisfiable { .. } => "serve",
            ArchiveError::Config(_) => "config",
        }
    }

    /// Recording the error concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            ArchiveError::NotFound(key)
            | ArchiveError::Transcode { key, .. }
            | ArchiveError::CacheUpload { key, .. }
            | ArchiveError::Storage { key, .. } => Some(key.as_str()),
            ArchiveError::Listing { prefix, .. } => Some(prefix.as_str()),
            _ => None,
        }
    }

    /// Short category safe to show to clients
    pub fn category(&self) -> &'static str {
        match self {
            ArchiveError::NotFound(_) => "not found",
            ArchiveError::Listing { .. } => "listing failed",
            ArchiveError::Transcode { .. } => "transcode failed",
            ArchiveError::CacheUpload { .. } => "cache upload failed",
            ArchiveError::Storage { .. } => "storage error",
            ArchiveError::Database(_) => "database error",
            ArchiveError::Io(_) => "io error",
            ArchiveError::InvalidRequest(_) => "invalid request",
            ArchiveError::RangeNotSatisfiable { .. } => "range not satisfiable",
            ArchiveError::Config(_) => "configuration error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_store_error_maps_to_not_found() {
        let err = object_store::Error::NotFound {
            path: "recordings/a.wav".to_string(),
            source: "missing".into(),
        };
        let mapped = ArchiveError::from_store("9_26_2025/a.wav", err);
        assert!(matches!(mapped, ArchiveError::NotFound(ref k) if k == "9_26_2025/a.wav"));
        assert_eq!(mapped.stage(), "fetch_source");
    }

    #[test]
    fn test_error_display() {
        let err = TranscodeError::Exit {
            code: Some(1),
            stderr: "Invalid data found".to_string(),
        };
        assert!(err.to_string().contains("Some(1)"));
        assert!(err.to_string().contains("Invalid data found"));

        let err = ArchiveError::RangeNotSatisfiable { length: 1000 };
        assert!(err.to_string().contains("1000"));
    }
}
