//! # Core Traits (Ports)
//!
//! The ingestion services only talk to the outside world through these
//! traits. Persistence, tag and user collaborators return `anyhow::Result`
//! since their failures are opaque to the core; media adapters return
//! `IngestError` because their failures are part of the ingestion contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;

use crate::errors::Result;
use crate::models::{Fingerprint, MediaKind, Post, PostId, Tag, User, UserId};

/// Data persistence contract for posts and their collections.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: PostId) -> anyhow::Result<Option<Post>>;
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> anyhow::Result<Option<Post>>;

    /// Tags attached to a saved post.
    async fn find_tags(&self, id: PostId) -> anyhow::Result<Vec<Tag>>;
    /// Related posts, matched in either direction of the relation.
    async fn find_relations(&self, id: PostId) -> anyhow::Result<Vec<Post>>;

    /// Inserts or updates the post and replaces its tag and relation sets.
    /// Returns the id of the saved post.
    async fn save(&self, post: &Post, tags: &[Tag], relations: &[Post]) -> anyhow::Result<PostId>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Tag>>;
    /// Creates and persists a new tag.
    async fn create(&self, name: &str) -> anyhow::Result<Tag>;
}

/// Turns free text into a list of normalized tag names, rejecting invalid ones.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TagNameValidator: Send + Sync {
    fn validate(&self, text: &str) -> anyhow::Result<Vec<String>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;
}

/// Result of inspecting a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MediaKind,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Maps raw bytes to a media kind. Pure inspection, no side effects.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    /// `original_name` is the uploader's filename, used only as a hint where
    /// the byte signature is ambiguous.
    async fn classify(&self, path: &Path, original_name: &str) -> Result<Classification>;
}

/// Deterministic on-disk layout for post content and thumbnails.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn content_path(&self, post_name: &str) -> Result<PathBuf>;
    /// Omitted dimensions resolve to the configured default size.
    fn default_thumbnail_path(
        &self,
        post_name: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<PathBuf>;
    /// At most one custom thumbnail exists per post, whatever its size.
    fn custom_thumbnail_path(&self, post_name: &str) -> Result<PathBuf>;

    /// Copies `src` into place; readers never observe a partial `dst`.
    async fn store(&self, src: &Path, dst: &Path) -> Result<()>;
    async fn exists(&self, path: &Path) -> bool;
    /// Deletes `path` if present. Absent files are not an error.
    async fn remove(&self, path: &Path) -> Result<()>;
    /// Validates format and exact size, then stores it as the post's custom
    /// thumbnail.
    async fn store_custom_thumbnail(&self, src: &Path, post_name: &str) -> Result<PathBuf>;
}

/// Where a thumbnail is rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailSource {
    LocalFile { kind: MediaKind, path: PathBuf },
    /// A still image published by a third party, e.g. a video platform.
    RemoteStill { url: String },
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// Renders `source` into `dst` at exactly `width`x`height`.
    async fn generate(
        &self,
        source: &ThumbnailSource,
        dst: &Path,
        width: u32,
        height: u32,
    ) -> Result<()>;
}

/// A downloaded resource living in a temporary file.
///
/// The file is removed when this value is dropped, whatever happened to it.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    size: u64,
}

impl DownloadedFile {
    pub fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fails with `PayloadTooLarge` past `max_bytes` and `TransferFailed` on
    /// network or protocol errors.
    async fn download(&self, url: &str, max_bytes: u64) -> Result<DownloadedFile>;
}
