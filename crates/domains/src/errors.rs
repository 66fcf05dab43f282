//! # Errors
//!
//! Centralized error handling for the ingestion pipeline.
//! Every service and adapter operation surfaces an `IngestError`; callers
//! match on the variant to decide how to report it.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{Post, PostId};

/// Violations of model-level rules that do not need any collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid safety rating \"{0}\"")]
    InvalidSafety(String),

    #[error("invalid post name \"{0}\"")]
    InvalidPostName(String),
}

/// The primary error type for ingestion operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The uploaded file has zero bytes.
    #[error("specified file is empty")]
    EmptyContent,

    /// The sniffed type is not an image, flash or video signature we accept.
    #[error("invalid file type \"{0}\"")]
    UnsupportedMediaType(String),

    /// Another post already owns this fingerprint.
    #[error("duplicate upload: {}", .0.repr())]
    DuplicateContent(Box<Post>),

    /// Only absolute http(s) URLs are accepted.
    #[error("invalid URL \"{0}\"")]
    InvalidUrl(String),

    /// The remote response is larger than the upload ceiling.
    #[error("remote file exceeds the upload limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Network or protocol failure while fetching a remote resource.
    #[error("transfer of \"{url}\" failed: {reason}")]
    TransferFailed { url: String, reason: String },

    /// A custom thumbnail of the wrong format or size.
    #[error("invalid thumbnail: {0}")]
    InvalidThumbnail(String),

    /// Requested thumbnail dimensions fall outside the configured bounds.
    #[error("invalid thumbnail size {width}x{height}")]
    InvalidThumbnailSize { width: u32, height: u32 },

    /// The source kind cannot be rendered into a thumbnail.
    #[error("thumbnail unavailable: {0}")]
    ThumbnailUnavailable(String),

    #[error("too many related posts (maximum: {max})")]
    TooManyRelations { max: usize },

    #[error("related post {0} does not exist")]
    RelatedPostNotFound(PostId),

    /// A tag or relation points at an entity that was never saved.
    #[error("all {0} must be saved")]
    UnsavedReference(&'static str),

    /// Metadata rules checked before the post may be persisted.
    #[error("{0}")]
    ValidationFailed(String),

    /// The staged content no longer matches the aggregate being committed.
    #[error("staged content is stale: {0}")]
    StaleStage(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Filesystem failure on a specific path.
    #[error("storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by an external collaborator (persistence, tags, users).
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

impl IngestError {
    /// Wraps an I/O error with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// A specialized Result type for ingestion logic.
pub type Result<T> = std::result::Result<T, IngestError>;
