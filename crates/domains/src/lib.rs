//! domains
//!
//! Models, errors and port traits for the post ingestion pipeline.
//! Nothing in this crate performs I/O; adapters live in `storage-adapters`.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use config::*;
pub use errors::*;
pub use models::*;
pub use traits::*;
