//! # LocalArtifactStore
//! Filesystem implementation of `ArtifactStore`.
//!
//! Layout under the storage root:
//!
//! ```text
//! {root}/posts/{name}
//! {root}/thumbnails/{width}x{height}/{name}
//! {root}/thumbnails/custom/{name}
//! ```

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domains::{ArtifactStore, DomainError, IngestError, Result, ThumbnailBounds};
use image::ImageFormat;
use tempfile::NamedTempFile;

pub struct LocalArtifactStore {
    root: PathBuf,
    bounds: ThumbnailBounds,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, bounds: ThumbnailBounds) -> Self {
        Self {
            root: root.into(),
            bounds,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Post names become file names, so they may not escape their directory.
fn checked_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(name)
    } else {
        Err(DomainError::InvalidPostName(name.to_string()).into())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn content_path(&self, post_name: &str) -> Result<PathBuf> {
        Ok(self.root.join("posts").join(checked_name(post_name)?))
    }

    fn default_thumbnail_path(
        &self,
        post_name: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<PathBuf> {
        let width = width.unwrap_or(self.bounds.default_width);
        let height = height.unwrap_or(self.bounds.default_height);
        Ok(self
            .root
            .join("thumbnails")
            .join(format!("{width}x{height}"))
            .join(checked_name(post_name)?))
    }

    fn custom_thumbnail_path(&self, post_name: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("thumbnails")
            .join("custom")
            .join(checked_name(post_name)?))
    }

    #[tracing::instrument(skip(self), fields(src = %src.display(), dst = %dst.display()))]
    async fn store(&self, src: &Path, dst: &Path) -> Result<()> {
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        let written = tokio::task::spawn_blocking(move || {
            let mut input = File::open(&src).map_err(|e| IngestError::storage(&src, e))?;
            persist_atomic(&dst, |out| io::copy(&mut input, out).map(|_| ()))
        })
        .await
        .map_err(|e| IngestError::Repository(e.into()))?;

        written?;
        tracing::debug!("Stored artifact");
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed artifact");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IngestError::storage(path, e)),
        }
    }

    #[tracing::instrument(skip(self), fields(src = %src.display()))]
    async fn store_custom_thumbnail(&self, src: &Path, post_name: &str) -> Result<PathBuf> {
        let dst = self.custom_thumbnail_path(post_name)?;
        let expected = (self.bounds.default_width, self.bounds.default_height);

        let (src, target) = (src.to_path_buf(), dst.clone());
        tokio::task::spawn_blocking(move || {
            let mut bytes = Vec::new();
            File::open(&src)
                .and_then(|mut f| f.read_to_end(&mut bytes))
                .map_err(|e| IngestError::storage(&src, e))?;

            check_custom_thumbnail(&bytes, expected)?;
            persist_atomic(&target, |out| out.write_all(&bytes))
        })
        .await
        .map_err(|e| IngestError::Repository(e.into()))??;

        tracing::info!(path = %dst.display(), "Stored custom thumbnail");
        Ok(dst)
    }
}

fn check_custom_thumbnail(bytes: &[u8], (width, height): (u32, u32)) -> Result<()> {
    let format = image::guess_format(bytes)
        .map_err(|_| IngestError::InvalidThumbnail("Invalid thumbnail type".to_string()))?;
    if !matches!(format, ImageFormat::Gif | ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(IngestError::InvalidThumbnail(format!(
            "Invalid thumbnail type \"{}\"",
            format.to_mime_type()
        )));
    }

    let actual = image::ImageReader::with_format(io::Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| IngestError::InvalidThumbnail(e.to_string()))?;
    if actual != (width, height) {
        return Err(IngestError::InvalidThumbnail(format!(
            "Invalid thumbnail size (should be {width}x{height})"
        )));
    }
    Ok(())
}

/// Writes `dst` through a sibling temporary file renamed into place, so
/// readers see either the old file or the complete new one.
pub(crate) fn persist_atomic<F>(dst: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let parent = dst
        .parent()
        .ok_or_else(|| IngestError::storage(dst, io::Error::from(io::ErrorKind::InvalidInput)))?;
    std::fs::create_dir_all(parent).map_err(|e| IngestError::storage(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| IngestError::storage(parent, e))?;
    write(&mut temp).map_err(|e| IngestError::storage(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| IngestError::storage(temp.path(), e))?;
    temp.persist(dst).map_err(|e| IngestError::storage(dst, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        image::RgbImage::new(width, height)
            .write_to(&mut io::Cursor::new(&mut out), format)
            .unwrap();
        out
    }

    fn store_in(dir: &TempDir) -> LocalArtifactStore {
        LocalArtifactStore::new(dir.path(), ThumbnailBounds::default())
    }

    #[test]
    fn test_paths_are_deterministic() {
        let store = LocalArtifactStore::new("/data", ThumbnailBounds::default());

        assert_eq!(store.content_path("abc").unwrap(), PathBuf::from("/data/posts/abc"));
        assert_eq!(
            store.default_thumbnail_path("abc", None, None).unwrap(),
            PathBuf::from("/data/thumbnails/150x150/abc")
        );
        assert_eq!(
            store.default_thumbnail_path("abc", Some(300), Some(200)).unwrap(),
            PathBuf::from("/data/thumbnails/300x200/abc")
        );
        assert_eq!(
            store.custom_thumbnail_path("abc").unwrap(),
            PathBuf::from("/data/thumbnails/custom/abc")
        );
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = LocalArtifactStore::new("/data", ThumbnailBounds::default());
        for name in ["", ".", "..", "../etc", "a/b", "a\\b"] {
            let err = store.content_path(name).unwrap_err();
            assert!(
                matches!(err, IngestError::Domain(DomainError::InvalidPostName(_))),
                "accepted {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_store_overwrites_and_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let src = dir.path().join("upload");
        let dst = store.content_path("post1").unwrap();

        std::fs::write(&src, b"first").unwrap();
        store.store(&src, &dst).await.unwrap();
        std::fs::write(&src, b"second").unwrap();
        store.store(&src, &dst).await.unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"second");
        assert!(store.exists(&dst).await);
        // no temp files left beside the target
        assert_eq!(std::fs::read_dir(dst.parent().unwrap()).unwrap().count(), 1);

        store.remove(&dst).await.unwrap();
        assert!(!store.exists(&dst).await);
        store.remove(&dst).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_missing_source() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let dst = store.content_path("post1").unwrap();

        let err = store
            .store(&dir.path().join("missing"), &dst)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_custom_thumbnail_validation() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let src = dir.path().join("thumb");

        std::fs::write(&src, encoded(150, 150, ImageFormat::Png)).unwrap();
        let path = store.store_custom_thumbnail(&src, "post1").await.unwrap();
        assert_eq!(path, store.custom_thumbnail_path("post1").unwrap());
        assert!(store.exists(&path).await);

        std::fs::write(&src, encoded(100, 150, ImageFormat::Jpeg)).unwrap();
        let err = store.store_custom_thumbnail(&src, "post1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid thumbnail: Invalid thumbnail size (should be 150x150)"
        );

        std::fs::write(&src, encoded(150, 150, ImageFormat::Bmp)).unwrap();
        let err = store.store_custom_thumbnail(&src, "post1").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidThumbnail(_)));

        std::fs::write(&src, b"not an image").unwrap();
        let err = store.store_custom_thumbnail(&src, "post1").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidThumbnail(_)));
    }
}
