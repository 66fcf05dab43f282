//! # SniffingClassifier
//! Classifies uploads by their leading bytes, never by the filename alone.
//! The filename is only consulted when an Ogg stream carries no codec we
//! recognise.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use domains::{Classification, ContentClassifier, IngestError, MediaKind, Result};
use image::ImageReader;

use crate::probe;

/// Bytes read for signature sniffing and header-only probes.
const SNIFF_LEN: usize = 512 * 1024;

#[derive(Debug, Clone, Default)]
pub struct SniffingClassifier;

impl SniffingClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentClassifier for SniffingClassifier {
    #[tracing::instrument(skip(self))]
    async fn classify(&self, path: &Path, original_name: &str) -> Result<Classification> {
        let path_buf = path.to_path_buf();
        let name = original_name.to_string();
        let classification = tokio::task::spawn_blocking(move || classify_file(&path_buf, &name))
            .await
            .map_err(|e| IngestError::Repository(e.into()))??;

        tracing::debug!(
            mime = %classification.mime_type,
            width = ?classification.width,
            height = ?classification.height,
            "Classified content"
        );
        Ok(classification)
    }
}

fn classify_file(path: &Path, original_name: &str) -> Result<Classification> {
    let mut file = File::open(path).map_err(|e| IngestError::storage(path, e))?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    (&mut file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| IngestError::storage(path, e))?;

    if header.is_empty() {
        return Err(IngestError::EmptyContent);
    }

    let mime = sniff(&header, original_name);
    let kind = kind_for(mime).ok_or_else(|| IngestError::UnsupportedMediaType(mime.to_string()))?;

    let (width, height) = match dimensions(kind, mime, path, &header, &mut file) {
        Some((w, h)) => (Some(w), Some(h)),
        None => {
            tracing::debug!(mime, "Dimensions not available");
            (None, None)
        }
    };

    Ok(Classification {
        kind,
        mime_type: mime.to_string(),
        width,
        height,
    })
}

/// Maps the leading bytes of a file to a MIME type.
pub(crate) fn sniff(header: &[u8], original_name: &str) -> &'static str {
    if let Ok(format) = image::guess_format(header) {
        return format.to_mime_type();
    }
    match header {
        [b'F' | b'C' | b'Z', b'W', b'S', ..] => "application/x-shockwave-flash",
        [0x1A, 0x45, 0xDF, 0xA3, ..] if is_webm(header) => "video/webm",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "video/x-matroska",
        [_, _, _, _, b'f', b't', b'y', b'p', b0, b1, b2, b3, ..] => {
            sniff_ftyp(&[*b0, *b1, *b2, *b3])
        }
        [b'F', b'L', b'V', ..] => "video/x-flv",
        [b'O', b'g', b'g', b'S', ..] => sniff_ogg(header, original_name),
        _ => "application/octet-stream",
    }
}

fn is_webm(header: &[u8]) -> bool {
    // DocType element inside the EBML header
    header
        .windows(7)
        .take(64)
        .any(|window| window == b"\x42\x82\x84webm")
}

/// ISO-BMFF major brands. Only the generic MP4 video brands count as
/// `video/mp4`.
fn sniff_ftyp(brand: &[u8; 4]) -> &'static str {
    match brand {
        [b'3', b'g', ..] => "video/3gpp",
        b"isom" | b"iso2" | b"mp41" | b"mp42" | b"avc1" | b"dash" | b"M4V " => "video/mp4",
        b"qt  " => "video/quicktime",
        b"M4A " | b"M4B " => "audio/mp4",
        b"heic" | b"heix" | b"mif1" | b"msf1" => "image/heic",
        _ => "application/octet-stream",
    }
}

fn sniff_ogg(header: &[u8], original_name: &str) -> &'static str {
    if probe::is_theora(header) {
        return "video/ogg";
    }
    let vorbis = header.windows(7).any(|w| w == b"\x01vorbis");
    let opus = header.windows(8).any(|w| w == b"OpusHead");
    if vorbis || opus {
        return "audio/ogg";
    }
    let hinted = mime_guess::from_path(original_name).first_raw();
    match hinted {
        Some("video/ogg") => "video/ogg",
        _ => "application/ogg",
    }
}

/// Media kinds the pipeline accepts; everything else is unsupported.
pub(crate) fn kind_for(mime: &str) -> Option<MediaKind> {
    match mime {
        "image/gif" | "image/png" | "image/jpeg" => Some(MediaKind::Image),
        "application/x-shockwave-flash" => Some(MediaKind::Flash),
        "video/webm" | "video/mp4" | "video/ogg" | "application/ogg" | "video/3gpp"
        | "video/x-flv" => Some(MediaKind::Video),
        _ => None,
    }
}

fn dimensions(
    kind: MediaKind,
    mime: &str,
    path: &Path,
    header: &[u8],
    file: &mut File,
) -> Option<(u32, u32)> {
    match kind {
        MediaKind::Image => image_dimensions(path),
        MediaKind::Flash => probe::swf_dimensions(header),
        MediaKind::Video => {
            let probed = match mime {
                "video/webm" => probe::ebml_dimensions(header),
                "video/mp4" | "video/3gpp" => {
                    file.seek(SeekFrom::Start(0)).ok()?;
                    probe::mp4_dimensions(&mut BufReader::new(file))
                }
                "video/x-flv" => probe::flv_dimensions(header),
                "video/ogg" => probe::theora_dimensions(header),
                _ => None,
            };
            probed.or_else(|| video_dimensions(path))
        }
    }
}

fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    ImageReader::open(path)
        .ok()?
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .inspect_err(|e| tracing::debug!(error = %e, "Could not read image dimensions"))
        .ok()
}

#[cfg(feature = "video")]
fn video_dimensions(path: &Path) -> Option<(u32, u32)> {
    crate::video::probe_dimensions(path)
}

#[cfg(not(feature = "video"))]
fn video_dimensions(_path: &Path) -> Option<(u32, u32)> {
    None
}
