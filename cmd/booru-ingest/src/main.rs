//! # booru-ingest
//!
//! Wires the ingestion services to the filesystem, HTTP and in-memory
//! adapters. Logs go to stderr, results to stdout as JSON.

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use configs::{LogSettings, Settings, ThumbnailEncoding};
use domains::{ArtifactStore, ContentClassifier, Post, PostContent, RemoteFetcher, SafetyRating};
use serde_json::json;
use services::{urls, BasicTagNameValidator, Collaborators, PostAggregate, PostService};
use storage_adapters::{
    HttpFetcher, ImageThumbnailGenerator, InMemoryPostRepository, InMemoryTagRepository,
    InMemoryUserRepository,
    LocalArtifactStore, SniffingClassifier, ThumbnailFormat,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

struct App {
    service: PostService,
    artifacts: Arc<LocalArtifactStore>,
    classifier: Arc<SniffingClassifier>,
}

impl App {
    fn build(settings: &Settings) -> anyhow::Result<Self> {
        // 1. Remote fetcher, shared by ingestion and remote stills
        let mut fetcher = HttpFetcher::new(settings.fetch_timeout(), &settings.fetch.user_agent)
            .context("building HTTP client")?;
        if let Some(dir) = &settings.storage.temp_dir {
            fetcher = fetcher.with_temp_dir(dir);
        }
        let fetcher: Arc<dyn RemoteFetcher> = Arc::new(fetcher);

        // 2. Filesystem adapters
        let artifacts = Arc::new(LocalArtifactStore::new(
            &settings.storage.root,
            settings.thumbnail_bounds(),
        ));
        let classifier = Arc::new(SniffingClassifier::new());
        let format = match settings.thumbnails.encoding {
            ThumbnailEncoding::Jpeg => ThumbnailFormat::Jpeg,
            ThumbnailEncoding::Png => ThumbnailFormat::Png,
        };
        let thumbnails =
            ImageThumbnailGenerator::new(fetcher.clone(), settings.fetch.upload_max_bytes)
                .with_format(format);

        // 3. Repositories live for this process only
        let ports = Collaborators {
            posts: Arc::new(InMemoryPostRepository::new()),
            tags: Arc::new(InMemoryTagRepository::new()),
            tag_names: Arc::new(BasicTagNameValidator::new(settings.posts.max_tag_length)),
            users: Arc::new(InMemoryUserRepository::new()),
            classifier: classifier.clone(),
            artifacts: artifacts.clone(),
            thumbnails: Arc::new(thumbnails),
            fetcher,
        };

        Ok(Self {
            service: PostService::new(ports, settings.ingest_config()),
            artifacts,
            classifier,
        })
    }

    async fn ingest(
        &self,
        source: &str,
        safety: SafetyRating,
        tags: Option<&str>,
        origin: &str,
        with_thumbnail: bool,
    ) -> anyhow::Result<serde_json::Value> {
        let mut aggregate = PostAggregate::spawn();

        let staged = if urls::is_http_url(source) {
            self.service.ingest_from_url(&mut aggregate, source).await?
        } else {
            let path = Path::new(source);
            let original_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.to_string());
            self.service.ingest_from_path(&mut aggregate, path, &original_name).await?
        };

        aggregate.set_safety(safety);
        aggregate.set_source(origin);
        if let Some(text) = tags {
            self.service.set_tags_from_text(&mut aggregate, text).await?;
        }
        let id = self.service.commit(&mut aggregate, staged).await?;

        let thumbnail = if with_thumbnail {
            // the post is saved either way
            match self.service.thumbnail_path(aggregate.post(), None, None).await {
                Ok(path) => Some(path.display().to_string()),
                Err(e) => {
                    tracing::warn!(error = %e, "Post saved without thumbnail");
                    None
                }
            }
        } else {
            None
        };

        Ok(json!({
            "id": id,
            "post": aggregate.post(),
            "tags": aggregate.tags(),
            "edit_token": aggregate.edit_token(),
            "thumbnail": thumbnail,
        }))
    }

    async fn thumbnail(
        &self,
        name: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> anyhow::Result<serde_json::Value> {
        let content = self.artifacts.content_path(name)?;
        anyhow::ensure!(
            self.artifacts.exists(&content).await,
            "no stored content for post \"{name}\""
        );

        let classification = self.classifier.classify(&content, name).await?;
        let file_size = tokio::fs::metadata(&content).await?.len();
        let mut post = Post::new(name);
        post.content = Some(PostContent::Local {
            kind: classification.kind,
            mime_type: classification.mime_type,
            file_size,
            width: classification.width,
            height: classification.height,
        });

        let path = self.service.thumbnail_path(&post, width, height).await?;
        Ok(json!({
            "name": name,
            "custom": self.service.has_custom_thumbnail(&post).await?,
            "thumbnail": path.display().to_string(),
        }))
    }
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("loading settings")?;
    init_tracing(&settings.log);

    let app = App::build(&settings)?;
    tracing::debug!(root = %settings.storage.root.display(), "Storage ready");

    let output = match cli.command {
        Commands::Ingest {
            source,
            safety,
            tags,
            origin,
            thumbnail,
        } => app.ingest(&source, safety, tags.as_deref(), &origin, thumbnail).await?,
        Commands::Thumbnail { name, width, height } => app.thumbnail(&name, width, height).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
