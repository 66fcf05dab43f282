//! # HttpFetcher
//! Downloads remote content into scoped temporary files.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use domains::{DownloadedFile, IngestError, RemoteFetcher, Result};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

pub struct HttpFetcher {
    client: Client,
    temp_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            temp_dir: None,
        })
    }

    /// Places downloads in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn temp_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload").suffix(".dat");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

fn transfer_failed(url: &str, reason: impl ToString) -> IngestError {
    IngestError::TransferFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    #[tracing::instrument(skip(self))]
    async fn download(&self, url: &str, max_bytes: u64) -> Result<DownloadedFile> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| transfer_failed(url, e))?;

        // 1. Refuse early when the server announces the size
        if let Some(length) = response.content_length() {
            if length > max_bytes {
                tracing::warn!(length, max_bytes, "Declared length over the upload limit");
                return Err(IngestError::PayloadTooLarge { limit: max_bytes });
            }
        }

        // 2. Stream into a temp file that is deleted on any early return
        let temp = self.temp_file().map_err(|e| IngestError::storage(std::env::temp_dir(), e))?;
        let (file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut size: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| transfer_failed(url, e))? {
            size += chunk.len() as u64;
            if size > max_bytes {
                tracing::warn!(max_bytes, "Download exceeded the upload limit");
                return Err(IngestError::PayloadTooLarge { limit: max_bytes });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| IngestError::storage(path.to_path_buf(), e))?;
        }
        file.flush()
            .await
            .map_err(|e| IngestError::storage(path.to_path_buf(), e))?;

        tracing::debug!(size, path = %path.display(), "Downloaded to temp file");
        Ok(DownloadedFile::new(path, size))
    }
}
