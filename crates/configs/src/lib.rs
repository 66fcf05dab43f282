//! # configs
//!
//! Settings for the ingestion pipeline, loaded from:
//! - built-in defaults
//! - an optional `booru.toml` (or an explicit file)
//! - environment variables prefixed with `BOORU__`, e.g.
//!   `BOORU__THUMBNAILS__DEFAULT_WIDTH=200`
//!
//! A `.env` file is read first when present.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use domains::{IngestConfig, ThumbnailBounds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FILE: &str = "booru.toml";
pub const ENV_PREFIX: &str = "BOORU";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub posts: PostSettings,
    pub thumbnails: ThumbnailSettings,
    pub fetch: FetchSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Root of the content and thumbnail tree.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Where remote downloads are buffered; the system temp dir if unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostSettings {
    #[serde(default = "default_max_source_length")]
    pub max_source_length: usize,

    #[serde(default = "default_max_related_posts")]
    pub max_related_posts: usize,

    #[serde(default = "default_max_tag_length")]
    pub max_tag_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailEncoding {
    #[default]
    Jpeg,
    Png,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThumbnailSettings {
    #[serde(default = "default_thumbnail_side")]
    pub default_width: u32,
    #[serde(default = "default_thumbnail_side")]
    pub default_height: u32,
    #[serde(default = "default_thumbnail_min")]
    pub min_width: u32,
    #[serde(default = "default_thumbnail_min")]
    pub min_height: u32,
    #[serde(default = "default_thumbnail_max")]
    pub max_width: u32,
    #[serde(default = "default_thumbnail_max")]
    pub max_height: u32,
    #[serde(default)]
    pub encoding: ThumbnailEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FetchSettings {
    /// Byte ceiling for remote downloads.
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_source_length() -> usize {
    200
}

fn default_max_related_posts() -> usize {
    50
}

fn default_max_tag_length() -> usize {
    64
}

fn default_thumbnail_side() -> u32 {
    150
}

fn default_thumbnail_min() -> u32 {
    50
}

fn default_thumbnail_max() -> u32 {
    1000
}

fn default_upload_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("booru-ingest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            temp_dir: None,
        }
    }
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            max_source_length: default_max_source_length(),
            max_related_posts: default_max_related_posts(),
            max_tag_length: default_max_tag_length(),
        }
    }
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            default_width: default_thumbnail_side(),
            default_height: default_thumbnail_side(),
            min_width: default_thumbnail_min(),
            min_height: default_thumbnail_min(),
            max_width: default_thumbnail_max(),
            max_height: default_thumbnail_max(),
            encoding: ThumbnailEncoding::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            upload_max_bytes: default_upload_max_bytes(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    /// Loads `.env`, then `booru.toml` if present, then `BOORU__*` variables.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_sources(None, Environment::with_prefix(ENV_PREFIX))
    }

    /// Like `load`, but the file at `path` must exist.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Some(path), Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let file = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = &self.thumbnails;
        if t.min_width == 0 || t.min_height == 0 {
            return Err(invalid("thumbnails.min_width", "minimum sizes must be positive"));
        }
        if t.min_width > t.max_width || t.min_height > t.max_height {
            return Err(invalid("thumbnails.max_width", "maximum is below minimum"));
        }
        if !(t.min_width..=t.max_width).contains(&t.default_width)
            || !(t.min_height..=t.max_height).contains(&t.default_height)
        {
            return Err(invalid(
                "thumbnails.default_width",
                format!("{}x{} is outside the allowed range", t.default_width, t.default_height),
            ));
        }
        if self.fetch.upload_max_bytes == 0 {
            return Err(invalid("fetch.upload_max_bytes", "must be positive"));
        }
        if self.posts.max_tag_length == 0 {
            return Err(invalid("posts.max_tag_length", "must be positive"));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn thumbnail_bounds(&self) -> ThumbnailBounds {
        let t = &self.thumbnails;
        ThumbnailBounds {
            default_width: t.default_width,
            default_height: t.default_height,
            min_width: t.min_width,
            min_height: t.min_height,
            max_width: t.max_width,
            max_height: t.max_height,
        }
    }

    /// The limits the ingestion core works with.
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_source_length: self.posts.max_source_length,
            max_related_posts: self.posts.max_related_posts,
            upload_max_bytes: self.fetch.upload_max_bytes,
            thumbnails: self.thumbnail_bounds(),
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_match_ingest_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ingest_config(), IngestConfig::default());
        assert_eq!(settings.storage.root, PathBuf::from("./data"));
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(30));
        assert!(settings.fetch.user_agent.starts_with("booru-ingest/"));
        settings.validate().unwrap();
    }

    #[test]
    fn test_file_then_env_override() {
        let file = toml(
            r#"
            [storage]
            root = "/srv/booru"

            [thumbnails]
            default_width = 200
            encoding = "png"

            [posts]
            max_related_posts = 5
            "#,
        );

        let settings = Settings::from_sources(
            Some(file.path()),
            env(&[("BOORU__POSTS__MAX_RELATED_POSTS", "2"), ("BOORU__LOG__JSON", "true")]),
        )
        .unwrap();

        assert_eq!(settings.storage.root, PathBuf::from("/srv/booru"));
        assert_eq!(settings.thumbnails.default_width, 200);
        assert_eq!(settings.thumbnails.default_height, 150);
        assert_eq!(settings.thumbnails.encoding, ThumbnailEncoding::Png);
        assert_eq!(settings.posts.max_related_posts, 2);
        assert!(settings.log.json);
        assert_eq!(settings.ingest_config().thumbnails.default_width, 200);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = Settings::from_sources(Some(Path::new("/nonexistent/booru.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Load(_)));
    }

    #[test]
    fn test_rejects_inconsistent_bounds() {
        let err = Settings::from_sources(
            None,
            env(&[("BOORU__THUMBNAILS__DEFAULT_WIDTH", "2000")]),
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "thumbnails.default_width", .. }));

        let mut settings = Settings::default();
        settings.thumbnails.min_height = 500;
        settings.thumbnails.max_height = 400;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.fetch.upload_max_bytes = 0;
        assert!(settings.validate().is_err());
    }
}
