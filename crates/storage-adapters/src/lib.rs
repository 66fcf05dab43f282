//! # storage-adapters
//!
//! Filesystem, HTTP and in-memory implementations of the ingestion ports.
//! Video decoding through libav is only compiled with the `video` feature;
//! without it video dimensions come from container headers alone.

pub mod artifacts;
pub mod classifier;
pub mod fetch;
pub mod memory;
mod probe;
pub mod thumbnails;
#[cfg(feature = "video")]
mod video;

pub use artifacts::LocalArtifactStore;
pub use classifier::SniffingClassifier;
pub use fetch::HttpFetcher;
pub use memory::{InMemoryPostRepository, InMemoryTagRepository, InMemoryUserRepository};
pub use thumbnails::{ImageThumbnailGenerator, ThumbnailFormat};
