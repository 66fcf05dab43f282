//! # Domain Models
//!
//! These structs represent the core entities of the booru: posts, the tags
//! attached to them and the users who uploaded them.
//! Identifiers are assigned by the persistence layer; an absent id means the
//! entity has not been saved yet.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Identifier assigned to a post by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Content-derived identity of a post.
///
/// A lowercase hex digest of the file bytes for local media, or the
/// platform video id for remote video links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of media stored locally on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Flash,
    Video,
}

/// The externally visible post type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Image,
    Flash,
    Video,
    RemoteVideoLink,
}

impl From<MediaKind> for PostKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => PostKind::Image,
            MediaKind::Flash => PostKind::Flash,
            MediaKind::Video => PostKind::Video,
        }
    }
}

/// What a post's primary content is and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostContent {
    /// A file kept under the post's canonical content path.
    Local {
        kind: MediaKind,
        mime_type: String,
        file_size: u64,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// A video hosted by a third-party platform, referenced by id.
    RemoteVideo { video_id: String },
}

impl PostContent {
    pub fn kind(&self) -> PostKind {
        match self {
            PostContent::Local { kind, .. } => (*kind).into(),
            PostContent::RemoteVideo { .. } => PostKind::RemoteVideoLink,
        }
    }
}

/// Safety rating of a post. The numeric values are stable and feed the
/// edit token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyRating {
    Safe,
    Sketchy,
    Unsafe,
}

impl SafetyRating {
    pub fn as_integer(self) -> u8 {
        match self {
            SafetyRating::Safe => 1,
            SafetyRating::Sketchy => 2,
            SafetyRating::Unsafe => 3,
        }
    }

    pub fn from_integer(value: u8) -> Result<Self, DomainError> {
        match value {
            1 => Ok(SafetyRating::Safe),
            2 => Ok(SafetyRating::Sketchy),
            3 => Ok(SafetyRating::Unsafe),
            other => Err(DomainError::InvalidSafety(other.to_string())),
        }
    }
}

impl std::str::FromStr for SafetyRating {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" | "1" => Ok(SafetyRating::Safe),
            "sketchy" | "2" => Ok(SafetyRating::Sketchy),
            "unsafe" | "3" => Ok(SafetyRating::Unsafe),
            _ => Err(DomainError::InvalidSafety(s.to_string())),
        }
    }
}

/// The central entity: one uploaded piece of media and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// `None` until the persistence layer saves the post.
    pub id: Option<PostId>,
    /// Canonical storage filename; storage paths are derived from it.
    pub name: String,
    /// Filename (or URL) the uploader supplied. Metadata only.
    pub original_name: Option<String>,
    pub content: Option<PostContent>,
    pub fingerprint: Option<Fingerprint>,
    pub safety: Option<SafetyRating>,
    pub hidden: bool,
    pub upload_date: DateTime<Utc>,
    /// Weak reference; resolve through `UserRepository`.
    pub uploader_id: Option<UserId>,
    pub source: String,

    // Maintained by collaborators outside the ingestion core.
    pub comment_count: u32,
    pub favorite_count: u32,
    pub score: i32,
}

impl Post {
    /// An empty, unsaved post with the given canonical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            original_name: None,
            content: None,
            fingerprint: None,
            safety: None,
            hidden: false,
            upload_date: Utc::now(),
            uploader_id: None,
            source: String::new(),
            comment_count: 0,
            favorite_count: 0,
            score: 0,
        }
    }

    /// An empty, unsaved post with a freshly generated canonical name.
    pub fn spawn() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }

    pub fn kind(&self) -> Option<PostKind> {
        self.content.as_ref().map(PostContent::kind)
    }

    pub fn mime_type(&self) -> Option<&str> {
        match &self.content {
            Some(PostContent::Local { mime_type, .. }) => Some(mime_type),
            _ => None,
        }
    }

    pub fn file_size(&self) -> Option<u64> {
        match &self.content {
            Some(PostContent::Local { file_size, .. }) => Some(*file_size),
            _ => None,
        }
    }

    pub fn dimensions(&self) -> (Option<u32>, Option<u32>) {
        match &self.content {
            Some(PostContent::Local { width, height, .. }) => (*width, *height),
            _ => (None, None),
        }
    }

    /// Short textual reference used in messages and the edit token.
    pub fn repr(&self) -> String {
        match self.id {
            Some(id) => format!("@{id}"),
            None => format!("@{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<TagId>,
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into() }
    }

    /// Short textual reference used in messages and the edit token.
    pub fn repr(&self) -> String {
        format!("#{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}
