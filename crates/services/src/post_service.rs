//! # PostService
//!
//! Orchestrates content ingestion for a `PostAggregate`:
//! classify → fingerprint → duplicate check → canonical store, then a
//! separate `commit` that validates and persists the metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use domains::{
    ArtifactStore, ContentClassifier, Fingerprint, IngestConfig, IngestError, Post, PostContent,
    PostId, PostKind, PostRepository, RemoteFetcher, Result, TagNameValidator, TagRepository,
    ThumbnailGenerator, ThumbnailSource, User, UserRepository,
};

use crate::aggregate::{IngestState, PostAggregate, StagedContent};
use crate::fingerprint::{fingerprint_file, FingerprintStore};
use crate::urls;

/// Every port `PostService` talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub posts: Arc<dyn PostRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub tag_names: Arc<dyn TagNameValidator>,
    pub users: Arc<dyn UserRepository>,
    pub classifier: Arc<dyn ContentClassifier>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub thumbnails: Arc<dyn ThumbnailGenerator>,
    pub fetcher: Arc<dyn RemoteFetcher>,
}

pub struct PostService {
    ports: Collaborators,
    fingerprints: FingerprintStore,
    config: IngestConfig,
}

impl PostService {
    pub fn new(ports: Collaborators, config: IngestConfig) -> Self {
        let fingerprints = FingerprintStore::new(ports.posts.clone());
        Self {
            ports,
            fingerprints,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn fingerprints(&self) -> &FingerprintStore {
        &self.fingerprints
    }

    /// Loads a saved post with its tag and relation sets.
    pub async fn load(&self, id: PostId) -> Result<Option<PostAggregate>> {
        let Some(post) = self.ports.posts.find_by_id(id).await? else {
            return Ok(None);
        };
        let tags = self.ports.posts.find_tags(id).await?;
        let relations = self.ports.posts.find_relations(id).await?;
        Ok(Some(PostAggregate::from_parts(post, tags, relations)))
    }

    /// Resolves the weak uploader reference.
    pub async fn uploader(&self, post: &Post) -> Result<Option<User>> {
        match post.uploader_id {
            Some(id) => Ok(self.ports.users.find_by_id(id).await?),
            None => Ok(None),
        }
    }

    /// Ingests a local file as the post's content.
    ///
    /// On success the file is already in canonical storage; the metadata is
    /// persisted only once the returned `StagedContent` is committed.
    #[tracing::instrument(
        skip(self, aggregate),
        fields(post = %aggregate.post.name, path = %path.display())
    )]
    pub async fn ingest_from_path(
        &self,
        aggregate: &mut PostAggregate,
        path: &Path,
        original_name: &str,
    ) -> Result<StagedContent> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| IngestError::storage(path, e))?;
        let file_size = metadata.len();
        aggregate.post.original_name = Some(original_name.to_string());

        if file_size == 0 {
            return Err(IngestError::EmptyContent);
        }

        let fingerprint = fingerprint_file(path).await?;
        aggregate.post.fingerprint = Some(fingerprint.clone());

        let classification = self.ports.classifier.classify(path, original_name).await?;
        aggregate.post.content = Some(PostContent::Local {
            kind: classification.kind,
            mime_type: classification.mime_type,
            file_size,
            width: classification.width,
            height: classification.height,
        });
        aggregate.state = IngestState::Classified;

        self.fingerprints
            .check_duplicate(&fingerprint, aggregate.post.id)
            .await?;
        aggregate.state = IngestState::Fingerprinted;

        let content_path = self.ports.artifacts.content_path(&aggregate.post.name)?;
        self.ports.artifacts.store(path, &content_path).await?;
        self.remove_stale_thumbnail(&aggregate.post.name).await?;
        aggregate.state = IngestState::Stored;

        tracing::info!(
            fingerprint = %fingerprint,
            size = file_size,
            kind = ?classification.kind,
            "Stored post content"
        );

        Ok(StagedContent {
            post_name: aggregate.post.name.clone(),
            kind: classification.kind.into(),
            fingerprint,
            content_path: Some(content_path),
        })
    }

    /// Ingests remote content.
    ///
    /// Known video-platform links are referenced without downloading;
    /// anything else is fetched into a temporary file that is removed
    /// whatever the outcome of the ingestion.
    #[tracing::instrument(skip(self, aggregate), fields(post = %aggregate.post.name))]
    pub async fn ingest_from_url(
        &self,
        aggregate: &mut PostAggregate,
        url: &str,
    ) -> Result<StagedContent> {
        if !urls::is_http_url(url) {
            return Err(IngestError::InvalidUrl(url.to_string()));
        }
        aggregate.post.original_name = Some(url.to_string());

        if let Some(video_id) = urls::remote_video_id(url) {
            return self.ingest_remote_video(aggregate, video_id).await;
        }

        let download = self
            .ports
            .fetcher
            .download(url, self.config.upload_max_bytes)
            .await?;
        tracing::debug!(size = download.size(), "Downloaded remote content");

        self.ingest_from_path(aggregate, download.path(), &urls::basename(url))
            .await
    }

    async fn ingest_remote_video(
        &self,
        aggregate: &mut PostAggregate,
        video_id: String,
    ) -> Result<StagedContent> {
        let fingerprint = Fingerprint::new(video_id.clone());
        aggregate.post.content = Some(PostContent::RemoteVideo { video_id });
        aggregate.post.fingerprint = Some(fingerprint.clone());
        aggregate.state = IngestState::Classified;

        self.fingerprints
            .check_duplicate(&fingerprint, aggregate.post.id)
            .await?;
        aggregate.state = IngestState::Fingerprinted;

        self.remove_stale_thumbnail(&aggregate.post.name).await?;
        aggregate.state = IngestState::Stored;

        tracing::info!(fingerprint = %fingerprint, "Linked remote video");

        Ok(StagedContent {
            post_name: aggregate.post.name.clone(),
            kind: PostKind::RemoteVideoLink,
            fingerprint,
            content_path: None,
        })
    }

    async fn remove_stale_thumbnail(&self, post_name: &str) -> Result<()> {
        let thumbnail = self.ports.artifacts.default_thumbnail_path(post_name, None, None)?;
        self.ports.artifacts.remove(&thumbnail).await
    }

    /// Validates and persists a post whose content was just staged.
    ///
    /// If validation fails here the staged file stays on disk under the
    /// post's name until a later ingestion overwrites it.
    #[tracing::instrument(skip(self, aggregate, staged), fields(post = %aggregate.post.name))]
    pub async fn commit(
        &self,
        aggregate: &mut PostAggregate,
        staged: StagedContent,
    ) -> Result<PostId> {
        if staged.post_name != aggregate.post.name {
            return Err(IngestError::StaleStage(format!(
                "staged for post \"{}\"",
                staged.post_name
            )));
        }
        if aggregate.post.fingerprint.as_ref() != Some(&staged.fingerprint) {
            return Err(IngestError::StaleStage(
                "content changed after staging".to_string(),
            ));
        }
        self.save(aggregate).await
    }

    /// Validates and persists the post with its tag and relation sets.
    pub async fn save(&self, aggregate: &mut PostAggregate) -> Result<PostId> {
        aggregate.validate(&self.config)?;
        let id = self
            .ports
            .posts
            .save(&aggregate.post, &aggregate.tags, &aggregate.relations)
            .await?;
        aggregate.post.id = Some(id);
        tracing::info!(id = %id, "Saved post");
        Ok(id)
    }

    /// Resolves tag names from free text, creating tags that do not exist yet.
    pub async fn set_tags_from_text(
        &self,
        aggregate: &mut PostAggregate,
        text: &str,
    ) -> Result<()> {
        let names = self
            .ports
            .tag_names
            .validate(text)
            .map_err(|e| IngestError::ValidationFailed(e.to_string()))?;

        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let tag = match self.ports.tags.find_by_name(&name).await? {
                Some(tag) => tag,
                None => {
                    tracing::debug!(tag = %name, "Creating tag");
                    self.ports.tags.create(&name).await?
                }
            };
            tags.push(tag);
        }
        aggregate.set_tags(tags)
    }

    /// Parses related post ids out of free text.
    ///
    /// Any non-digit separates ids. The post's own id is skipped, repeated
    /// ids count once, and more than `max_related_posts` distinct ids fail.
    pub async fn set_relations_from_text(
        &self,
        aggregate: &mut PostAggregate,
        text: &str,
    ) -> Result<()> {
        let max = self.config.max_related_posts;
        let mut ids: Vec<PostId> = Vec::new();

        for token in text.split(|c: char| !c.is_ascii_digit()).filter(|t| !t.is_empty()) {
            let id = token
                .parse::<u64>()
                .map(PostId)
                .map_err(|_| {
                    IngestError::ValidationFailed(format!("Invalid post id \"{token}\""))
                })?;
            // ids start at 1
            if id.0 == 0 || Some(id) == aggregate.post.id || ids.contains(&id) {
                continue;
            }
            if ids.len() >= max {
                return Err(IngestError::TooManyRelations { max });
            }
            ids.push(id);
        }

        let mut related = Vec::with_capacity(ids.len());
        for id in ids {
            let post = self
                .ports
                .posts
                .find_by_id(id)
                .await?
                .ok_or(IngestError::RelatedPostNotFound(id))?;
            related.push(post);
        }
        aggregate.set_relations(related)
    }

    /// Renders the default thumbnail at the requested (or default) size.
    #[tracing::instrument(skip(self, post), fields(post = %post.name))]
    pub async fn generate_thumbnail(
        &self,
        post: &Post,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<PathBuf> {
        let (width, height) = self.config.thumbnails.resolve(width, height)?;
        let dst = self
            .ports
            .artifacts
            .default_thumbnail_path(&post.name, Some(width), Some(height))?;

        let source = match &post.content {
            Some(PostContent::Local { kind, .. }) => ThumbnailSource::LocalFile {
                kind: *kind,
                path: self.ports.artifacts.content_path(&post.name)?,
            },
            Some(PostContent::RemoteVideo { video_id }) => ThumbnailSource::RemoteStill {
                url: urls::remote_video_thumbnail_url(video_id),
            },
            None => {
                return Err(IngestError::ThumbnailUnavailable(
                    "post has no content".to_string(),
                ))
            }
        };

        self.ports.thumbnails.generate(&source, &dst, width, height).await?;
        Ok(dst)
    }

    /// Path of the thumbnail to show for `post`.
    ///
    /// Prefers the custom thumbnail, then an existing default thumbnail of
    /// the requested size, and only then renders one. A rendering failure
    /// is returned to the caller; the post itself stays valid without one.
    pub async fn thumbnail_path(
        &self,
        post: &Post,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<PathBuf> {
        let custom = self.ports.artifacts.custom_thumbnail_path(&post.name)?;
        if self.ports.artifacts.exists(&custom).await {
            return Ok(custom);
        }

        let (width, height) = self.config.thumbnails.resolve(width, height)?;
        let default = self
            .ports
            .artifacts
            .default_thumbnail_path(&post.name, Some(width), Some(height))?;
        if self.ports.artifacts.exists(&default).await {
            return Ok(default);
        }

        self.generate_thumbnail(post, Some(width), Some(height))
            .await
            .inspect_err(|e| {
                tracing::warn!(post = %post.name, error = %e, "Thumbnail generation failed")
            })
    }

    pub async fn has_custom_thumbnail(&self, post: &Post) -> Result<bool> {
        let custom = self.ports.artifacts.custom_thumbnail_path(&post.name)?;
        Ok(self.ports.artifacts.exists(&custom).await)
    }

    /// Stores a caller-supplied thumbnail for `post`.
    pub async fn set_custom_thumbnail(&self, post: &Post, src: &Path) -> Result<PathBuf> {
        self.ports.artifacts.store_custom_thumbnail(src, &post.name).await
    }
}
