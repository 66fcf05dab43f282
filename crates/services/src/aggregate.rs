//! # PostAggregate
//!
//! A post together with its tag and relation sets. Collections are loaded
//! explicitly (see `PostService::load`) or set by the caller; nothing here is
//! fetched lazily behind the caller's back.

use std::collections::HashSet;
use std::path::PathBuf;

use domains::{
    Fingerprint, IngestConfig, IngestError, PostKind, Post, PostId, Result, SafetyRating, Tag, User,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::natsort::natural_sort;

/// Progress of content ingestion on an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    Empty,
    Classified,
    Fingerprinted,
    Stored,
}

/// Proof that new content was classified, checked for duplicates and written
/// to canonical storage.
///
/// The file is already on disk; the post metadata is not saved until this
/// value is passed to `PostService::commit`.
#[must_use = "staged content must be committed for the post to be saved"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedContent {
    pub post_name: String,
    pub kind: PostKind,
    pub fingerprint: Fingerprint,
    /// `None` for remote video links, which have no local file.
    pub content_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostAggregate {
    pub(crate) post: Post,
    pub(crate) tags: Vec<Tag>,
    pub(crate) relations: Vec<Post>,
    pub(crate) state: IngestState,
}

impl PostAggregate {
    /// A new, unsaved post with a generated canonical name.
    pub fn spawn() -> Self {
        Self::from_post(Post::spawn())
    }

    pub fn from_post(post: Post) -> Self {
        Self {
            post,
            tags: Vec::new(),
            relations: Vec::new(),
            state: IngestState::Empty,
        }
    }

    /// Assembles an aggregate from already loaded parts.
    pub fn from_parts(post: Post, tags: Vec<Tag>, relations: Vec<Post>) -> Self {
        let state = if post.content.is_some() {
            IngestState::Stored
        } else {
            IngestState::Empty
        };
        Self {
            post,
            tags,
            relations,
            state,
        }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn id(&self) -> Option<PostId> {
        self.post.id
    }

    pub fn name(&self) -> &str {
        &self.post.name
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn relations(&self) -> &[Post] {
        &self.relations
    }

    pub fn into_post(self) -> Post {
        self.post
    }

    pub fn set_safety(&mut self, safety: SafetyRating) {
        self.post.safety = Some(safety);
    }

    pub fn set_source(&mut self, source: &str) {
        self.post.source = source.trim().to_string();
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.post.hidden = hidden;
    }

    pub fn set_uploader(&mut self, user: Option<&User>) {
        self.post.uploader_id = user.map(|u| u.id);
    }

    /// Replaces the tag set. Every tag must be saved; duplicates by id are
    /// dropped, keeping the first occurrence.
    pub fn set_tags(&mut self, tags: Vec<Tag>) -> Result<()> {
        if tags.iter().any(|tag| tag.id.is_none()) {
            return Err(IngestError::UnsavedReference("tags"));
        }
        let mut seen = HashSet::new();
        self.tags = tags.into_iter().filter(|tag| seen.insert(tag.id)).collect();
        Ok(())
    }

    /// Replaces the relation set. Every related post must be saved;
    /// duplicates by id are dropped, keeping the first occurrence.
    pub fn set_relations(&mut self, relations: Vec<Post>) -> Result<()> {
        if relations.iter().any(|post| post.id.is_none()) {
            return Err(IngestError::UnsavedReference("related posts"));
        }
        let mut seen = HashSet::new();
        self.relations = relations
            .into_iter()
            .filter(|post| seen.insert(post.id))
            .collect();
        Ok(())
    }

    pub fn is_tagged_with(&self, tag_name: &str) -> bool {
        let wanted = tag_name.trim().to_lowercase();
        self.tags
            .iter()
            .any(|tag| tag.name.trim().to_lowercase() == wanted)
    }

    /// Checks the rules a post must satisfy before it may be persisted.
    pub fn validate(&self, config: &IngestConfig) -> Result<()> {
        if self.post.content.is_none() {
            return Err(IngestError::ValidationFailed("No post type detected".to_string()));
        }
        if self.post.safety.is_none() {
            return Err(IngestError::ValidationFailed("No safety rating given".to_string()));
        }
        if self.post.source.chars().count() > config.max_source_length {
            return Err(IngestError::ValidationFailed(format!(
                "Source must have at most {} characters",
                config.max_source_length
            )));
        }
        Ok(())
    }

    /// Digest over the mutable metadata, used to detect concurrent edits.
    ///
    /// Tags, related posts, the numeric safety rating, the source and the
    /// fingerprint are sorted in natural case-insensitive order, joined with
    /// single spaces and hashed, so the token does not depend on the order
    /// the collections were filled in.
    pub fn edit_token(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.tags.len() + self.relations.len() + 3);
        parts.extend(self.tags.iter().map(Tag::repr));
        parts.extend(self.relations.iter().map(Post::repr));
        parts.push(
            self.post
                .safety
                .map(|safety| safety.as_integer().to_string())
                .unwrap_or_default(),
        );
        parts.push(self.post.source.clone());
        parts.push(
            self.post
                .fingerprint
                .as_ref()
                .map(|fp| fp.as_str().to_string())
                .unwrap_or_default(),
        );

        natural_sort(&mut parts);

        hex::encode(Sha256::digest(parts.join(" ").as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{PostContent, MediaKind, TagId, UserId};

    fn tag(id: u64, name: &str) -> Tag {
        Tag {
            id: Some(TagId(id)),
            name: name.to_string(),
        }
    }

    fn related(id: u64) -> Post {
        let mut post = Post::new(format!("related{id}"));
        post.id = Some(PostId(id));
        post
    }

    fn populated() -> PostAggregate {
        let mut aggregate = PostAggregate::spawn();
        aggregate.set_safety(SafetyRating::Safe);
        aggregate.set_source("  https://example.com/art  ");
        aggregate.post.fingerprint = Some(Fingerprint::new("deadbeef"));
        aggregate
            .set_tags(vec![tag(1, "landscape"), tag(2, "Night"), tag(3, "sky2")])
            .unwrap();
        aggregate.set_relations(vec![related(10), related(9)]).unwrap();
        aggregate
    }

    #[test]
    fn test_edit_token_ignores_collection_order() {
        let first = populated();

        let mut second = populated();
        second
            .set_tags(vec![tag(3, "sky2"), tag(1, "landscape"), tag(2, "Night")])
            .unwrap();
        second.set_relations(vec![related(9), related(10)]).unwrap();

        assert_eq!(first.edit_token(), second.edit_token());
        assert_eq!(first.edit_token().len(), 64);
    }

    #[test]
    fn test_edit_token_tracks_every_input() {
        let base = populated().edit_token();

        let mut changed = populated();
        changed.set_tags(vec![tag(1, "landscape"), tag(2, "Night")]).unwrap();
        assert_ne!(changed.edit_token(), base);

        let mut changed = populated();
        changed.set_relations(vec![related(10)]).unwrap();
        assert_ne!(changed.edit_token(), base);

        let mut changed = populated();
        changed.set_safety(SafetyRating::Unsafe);
        assert_ne!(changed.edit_token(), base);

        let mut changed = populated();
        changed.set_source("https://example.com/other");
        assert_ne!(changed.edit_token(), base);

        let mut changed = populated();
        changed.post.fingerprint = Some(Fingerprint::new("cafebabe"));
        assert_ne!(changed.edit_token(), base);
    }

    #[test]
    fn test_set_tags_rejects_unsaved_and_dedupes() {
        let mut aggregate = PostAggregate::spawn();
        let err = aggregate
            .set_tags(vec![tag(1, "a"), Tag::new("unsaved")])
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsavedReference("tags")));

        aggregate
            .set_tags(vec![tag(1, "a"), tag(2, "b"), tag(1, "a")])
            .unwrap();
        let ids: Vec<_> = aggregate.tags().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![Some(TagId(1)), Some(TagId(2))]);
    }

    #[test]
    fn test_set_relations_rejects_unsaved_and_dedupes() {
        let mut aggregate = PostAggregate::spawn();
        let err = aggregate
            .set_relations(vec![related(1), Post::new("unsaved")])
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsavedReference("related posts")));

        aggregate
            .set_relations(vec![related(4), related(4), related(5)])
            .unwrap();
        assert_eq!(aggregate.relations().len(), 2);
    }

    #[test]
    fn test_is_tagged_with_is_case_insensitive() {
        let aggregate = populated();
        assert!(aggregate.is_tagged_with("night"));
        assert!(aggregate.is_tagged_with("  LANDSCAPE "));
        assert!(!aggregate.is_tagged_with("portrait"));
    }

    #[test]
    fn test_validate() {
        let config = IngestConfig {
            max_source_length: 10,
            ..IngestConfig::default()
        };
        let mut aggregate = PostAggregate::spawn();

        let err = aggregate.validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "No post type detected");

        aggregate.post.content = Some(PostContent::Local {
            kind: MediaKind::Image,
            mime_type: "image/png".to_string(),
            file_size: 3,
            width: Some(1),
            height: Some(1),
        });
        assert!(matches!(
            aggregate.validate(&config),
            Err(IngestError::ValidationFailed(_))
        ));

        aggregate.set_safety(SafetyRating::Sketchy);
        aggregate.set_source("0123456789");
        aggregate.validate(&config).unwrap();

        aggregate.set_source("0123456789a");
        let err = aggregate.validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "Source must have at most 10 characters");
    }

    #[test]
    fn test_setters() {
        let mut aggregate = PostAggregate::spawn();
        aggregate.set_hidden(true);
        aggregate.set_uploader(Some(&User {
            id: UserId(3),
            name: "uploader".to_string(),
        }));
        assert!(aggregate.post().hidden);
        assert_eq!(aggregate.post().uploader_id, Some(UserId(3)));
        assert_eq!(populated().post().source, "https://example.com/art");

        aggregate.set_uploader(None);
        assert_eq!(aggregate.post().uploader_id, None);
    }
}
