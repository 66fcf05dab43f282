//! Shared harness for the end-to-end tests: real filesystem, HTTP and
//! in-memory adapters rooted in a scratch directory.

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use domains::{IngestConfig, RemoteFetcher};
use image::ImageFormat;
use services::{BasicTagNameValidator, Collaborators, PostService};
use storage_adapters::{
    HttpFetcher, ImageThumbnailGenerator, InMemoryPostRepository, InMemoryTagRepository,
    InMemoryUserRepository,
    LocalArtifactStore, SniffingClassifier,
};
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub service: PostService,
    pub posts: Arc<InMemoryPostRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub artifacts: Arc<LocalArtifactStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(configs::Settings::default().ingest_config())
    }

    pub fn with_config(config: IngestConfig) -> Self {
        let dir = TempDir::new().expect("scratch dir");
        std::fs::create_dir_all(dir.path().join("tmp")).expect("download dir");
        std::fs::create_dir_all(dir.path().join("uploads")).expect("upload dir");

        let fetcher: Arc<dyn RemoteFetcher> = Arc::new(
            HttpFetcher::new(Duration::from_secs(5), "booru-integration-tests")
                .expect("http client")
                .with_temp_dir(dir.path().join("tmp")),
        );
        let posts = Arc::new(InMemoryPostRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let artifacts = Arc::new(LocalArtifactStore::new(
            dir.path().join("store"),
            config.thumbnails,
        ));

        let ports = Collaborators {
            posts: posts.clone(),
            tags: Arc::new(InMemoryTagRepository::new()),
            tag_names: Arc::new(BasicTagNameValidator::default()),
            users: users.clone(),
            classifier: Arc::new(SniffingClassifier::new()),
            artifacts: artifacts.clone(),
            thumbnails: Arc::new(ImageThumbnailGenerator::new(
                fetcher.clone(),
                config.upload_max_bytes,
            )),
            fetcher,
        };

        Self {
            service: PostService::new(ports, config),
            dir,
            posts,
            users,
            artifacts,
        }
    }

    /// Writes an upload into the scratch dir and returns its path.
    pub fn upload(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join("uploads").join(name);
        std::fs::write(&path, bytes).expect("write upload");
        path
    }

    /// Directory the fetcher buffers downloads in.
    pub fn download_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn leftover_downloads(&self) -> usize {
        count_entries(&self.download_dir())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Serves `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut image = image::RgbImage::new(width, height);
    // non-uniform pixels so different sizes hash differently
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
    }
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode test image");
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// Smallest WebM header the classifier understands: EBML header with the
/// `webm` doctype and one video track.
pub fn webm(width: u16, height: u16) -> Vec<u8> {
    fn element(id: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.push(0x80 | payload.len() as u8);
        out.extend_from_slice(payload);
        out
    }

    let mut video = element(&[0xB0], &width.to_be_bytes());
    video.extend(element(&[0xBA], &height.to_be_bytes()));
    let track_entry = element(&[0xAE], &element(&[0xE0], &video));
    let tracks = element(&[0x16, 0x54, 0xAE, 0x6B], &track_entry);

    let mut out = element(&[0x1A, 0x45, 0xDF, 0xA3], &element(&[0x42, 0x82], b"webm"));
    out.extend(element(&[0x18, 0x53, 0x80, 0x67], &tracks));
    out
}

/// Uncompressed SWF header for a 550x400 movie.
pub fn swf() -> Vec<u8> {
    // RECT: nbits=15, xmin=0, xmax=11000, ymin=0, ymax=8000 (twips)
    let mut bits = String::from("01111");
    for value in [0u32, 11000, 0, 8000] {
        bits.push_str(&format!("{value:015b}"));
    }
    while bits.len() % 8 != 0 {
        bits.push('0');
    }
    let rect: Vec<u8> = bits
        .as_bytes()
        .chunks(8)
        .map(|byte| {
            u8::from_str_radix(std::str::from_utf8(byte).expect("ascii bits"), 2).expect("binary")
        })
        .collect();

    let mut out = b"FWS\x0a\x00\x00\x00\x00".to_vec();
    out.extend(rect);
    out.extend_from_slice(&[0, 24, 1, 0]);
    out
}
