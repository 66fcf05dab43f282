//! # ImageThumbnailGenerator
//! Renders thumbnails with `image`, cropping to fill the requested size.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use domains::{IngestError, MediaKind, RemoteFetcher, Result, ThumbnailGenerator, ThumbnailSource};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::artifacts::persist_atomic;

/// Encoding of generated thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailFormat {
    #[default]
    Jpeg,
    /// Lossless, recompressed with oxipng.
    Png,
}

pub struct ImageThumbnailGenerator {
    fetcher: Arc<dyn RemoteFetcher>,
    remote_max_bytes: u64,
    format: ThumbnailFormat,
}

impl ImageThumbnailGenerator {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, remote_max_bytes: u64) -> Self {
        Self {
            fetcher,
            remote_max_bytes,
            format: ThumbnailFormat::default(),
        }
    }

    pub fn with_format(mut self, format: ThumbnailFormat) -> Self {
        self.format = format;
        self
    }

    async fn render_local(&self, path: &Path, dst: &Path, width: u32, height: u32) -> Result<()> {
        let (path, dst, format) = (path.to_path_buf(), dst.to_path_buf(), self.format);
        tokio::task::spawn_blocking(move || {
            let source = image::ImageReader::open(&path)
                .map_err(|e| IngestError::storage(&path, e))?
                .with_guessed_format()
                .map_err(|e| IngestError::storage(&path, e))?
                .decode()
                .map_err(|e| {
                    IngestError::ThumbnailUnavailable(format!("cannot decode image: {e}"))
                })?;
            write_thumbnail(&source, &dst, width, height, format)
        })
        .await
        .map_err(|e| IngestError::Repository(e.into()))?
    }

    #[cfg(feature = "video")]
    async fn render_video(&self, path: &Path, dst: &Path, width: u32, height: u32) -> Result<()> {
        let (path, dst, format) = (path.to_path_buf(), dst.to_path_buf(), self.format);
        tokio::task::spawn_blocking(move || {
            let frame = crate::video::first_frame(&path)?;
            write_thumbnail(&DynamicImage::ImageRgb8(frame), &dst, width, height, format)
        })
        .await
        .map_err(|e| IngestError::Repository(e.into()))?
    }

    #[cfg(not(feature = "video"))]
    async fn render_video(
        &self,
        _path: &Path,
        _dst: &Path,
        _width: u32,
        _height: u32,
    ) -> Result<()> {
        Err(IngestError::ThumbnailUnavailable(
            "video thumbnails are not supported in this build".to_string(),
        ))
    }
}

#[async_trait]
impl ThumbnailGenerator for ImageThumbnailGenerator {
    #[tracing::instrument(skip(self), fields(dst = %dst.display()))]
    async fn generate(
        &self,
        source: &ThumbnailSource,
        dst: &Path,
        width: u32,
        height: u32,
    ) -> Result<()> {
        match source {
            ThumbnailSource::LocalFile { kind: MediaKind::Image, path } => {
                self.render_local(path, dst, width, height).await?
            }
            ThumbnailSource::LocalFile { kind: MediaKind::Video, path } => {
                self.render_video(path, dst, width, height).await?
            }
            ThumbnailSource::LocalFile { kind: MediaKind::Flash, .. } => {
                return Err(IngestError::ThumbnailUnavailable(
                    "flash content has no raster preview".to_string(),
                ))
            }
            ThumbnailSource::RemoteStill { url } => {
                let still = self.fetcher.download(url, self.remote_max_bytes).await?;
                self.render_local(still.path(), dst, width, height).await?
            }
        }

        tracing::info!(width, height, "Generated thumbnail");
        Ok(())
    }
}

fn write_thumbnail(
    source: &DynamicImage,
    dst: &Path,
    width: u32,
    height: u32,
    format: ThumbnailFormat,
) -> Result<()> {
    let resized = source.resize_to_fill(width, height, FilterType::Lanczos3);
    let bytes = encode(resized, format)?;
    persist_atomic(dst, |out| out.write_all(&bytes))
}

fn encode(image: DynamicImage, format: ThumbnailFormat) -> Result<Vec<u8>> {
    let encoding_failed = |e: &dyn std::fmt::Display| {
        IngestError::ThumbnailUnavailable(format!("cannot encode thumbnail: {e}"))
    };

    let mut out = Vec::new();
    match format {
        ThumbnailFormat::Jpeg => {
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
                .map_err(|e| encoding_failed(&e))?;
            Ok(out)
        }
        ThumbnailFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|e| encoding_failed(&e))?;
            oxipng::optimize_from_memory(&out, &oxipng::Options::from_preset(2))
                .map_err(|e| encoding_failed(&e))
        }
    }
}
