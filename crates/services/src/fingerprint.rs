//! Content fingerprints and duplicate detection.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use domains::{Fingerprint, IngestError, Post, PostId, PostRepository, Result};
use sha2::{Digest, Sha256};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 over the full file, streamed so large videos are never held in
/// memory. Hashing runs on the blocking pool.
pub async fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(|e| IngestError::Repository(e.into()))?
}

fn hash_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| IngestError::storage(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|e| IngestError::storage(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(Fingerprint::new(hex::encode(hasher.finalize())))
}

/// Answers whether a fingerprint is already owned by another post.
///
/// This is a read against persisted state at call time; two concurrent
/// uploads of identical content can both pass it.
#[derive(Clone)]
pub struct FingerprintStore {
    posts: Arc<dyn PostRepository>,
}

impl FingerprintStore {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    pub async fn find(&self, fingerprint: &Fingerprint) -> Result<Option<Post>> {
        Ok(self.posts.find_by_fingerprint(fingerprint).await?)
    }

    /// Fails with `DuplicateContent` when a post other than `self_id` owns
    /// `fingerprint`. An unsaved candidate (`self_id == None`) never matches.
    #[tracing::instrument(skip(self), fields(fingerprint = %fingerprint))]
    pub async fn check_duplicate(
        &self,
        fingerprint: &Fingerprint,
        self_id: Option<PostId>,
    ) -> Result<()> {
        match self.find(fingerprint).await? {
            Some(existing) if self_id.is_none() || existing.id != self_id => {
                tracing::info!(existing = %existing.repr(), "Rejected duplicate upload");
                Err(IngestError::DuplicateContent(Box::new(existing)))
            }
            _ => Ok(()),
        }
    }
}
