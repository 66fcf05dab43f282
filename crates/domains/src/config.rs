//! Limits consumed by the ingestion core.
//!
//! Loading these from files or the environment is the `configs` crate's job;
//! the core only ever sees the resolved values.

use serde::{Deserialize, Serialize};

use crate::errors::{IngestError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum length of a post's source text, in characters.
    pub max_source_length: usize,
    /// Maximum number of related posts a single post may reference.
    pub max_related_posts: usize,
    /// Byte ceiling for remote downloads.
    pub upload_max_bytes: u64,
    pub thumbnails: ThumbnailBounds,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_source_length: 200,
            max_related_posts: 50,
            upload_max_bytes: 10 * 1024 * 1024,
            thumbnails: ThumbnailBounds::default(),
        }
    }
}

/// Default size and accepted range for generated thumbnails.
///
/// Custom thumbnails must match the default size exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailBounds {
    pub default_width: u32,
    pub default_height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ThumbnailBounds {
    fn default() -> Self {
        Self {
            default_width: 150,
            default_height: 150,
            min_width: 50,
            min_height: 50,
            max_width: 1000,
            max_height: 1000,
        }
    }
}

impl ThumbnailBounds {
    /// Fills omitted dimensions with the defaults and checks the range.
    pub fn resolve(&self, width: Option<u32>, height: Option<u32>) -> Result<(u32, u32)> {
        let width = width.unwrap_or(self.default_width);
        let height = height.unwrap_or(self.default_height);

        if !(self.min_width..=self.max_width).contains(&width)
            || !(self.min_height..=self.max_height).contains(&height)
        {
            return Err(IngestError::InvalidThumbnailSize { width, height });
        }
        Ok((width, height))
    }
}
