//! services
//!
//! Business logic of the ingestion pipeline. Everything here talks to the
//! outside world through the ports defined in `domains::traits`.

pub mod aggregate;
pub mod fingerprint;
pub mod natsort;
pub mod post_service;
pub mod tag_names;
pub mod urls;

pub use aggregate::{IngestState, PostAggregate, StagedContent};
pub use fingerprint::{fingerprint_file, FingerprintStore};
pub use natsort::natural_cmp_ignore_case;
pub use post_service::{Collaborators, PostService};
pub use tag_names::BasicTagNameValidator;
