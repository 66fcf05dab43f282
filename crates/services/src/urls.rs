//! URL helpers for remote ingestion.

use once_cell::sync::Lazy;
use regex::Regex;

static HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("valid URL regex"));

/// Video platform links that are referenced instead of downloaded.
static REMOTE_VIDEO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^https?://(?:www\.|m\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]+)")
            .expect("valid watch-page regex"),
        Regex::new(r"^https?://youtu\.be/([A-Za-z0-9_-]+)").expect("valid short-link regex"),
    ]
});

pub fn is_http_url(url: &str) -> bool {
    HTTP_URL.is_match(url)
}

/// Extracts the platform video id when `url` is a known watch-page link.
pub fn remote_video_id(url: &str) -> Option<String> {
    REMOTE_VIDEO_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|captures| captures[1].to_string())
}

/// Still image the platform publishes for a video.
pub fn remote_video_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}

/// Last path segment of `url`, without query or fragment.
pub fn basename(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_suffix
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_suffix);

    match path.split_once('/') {
        Some((_, tail)) => tail
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("download")
            .to_string(),
        None => "download".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_http_schemes() {
        assert!(is_http_url("http://example.com/a.png"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com/a.png"));
        assert!(!is_http_url("file:///etc/passwd"));
        assert!(!is_http_url("example.com/a.png"));
    }

    #[test]
    fn extracts_youtube_ids() {
        assert_eq!(
            remote_video_id("https://www.youtube.com/watch?v=XYZ123").as_deref(),
            Some("XYZ123")
        );
        assert_eq!(
            remote_video_id("http://youtube.com/watch?feature=share&v=a_b-C9&t=10").as_deref(),
            Some("a_b-C9")
        );
        assert_eq!(remote_video_id("https://youtu.be/XYZ123").as_deref(), Some("XYZ123"));
        assert_eq!(remote_video_id("https://example.com/watch?v=XYZ123"), None);
        assert_eq!(remote_video_id("https://example.com/video.webm"), None);
    }

    #[test]
    fn thumbnail_url_uses_video_id() {
        assert_eq!(
            remote_video_thumbnail_url("XYZ123"),
            "https://img.youtube.com/vi/XYZ123/mqdefault.jpg"
        );
    }

    #[test]
    fn basename_strips_query_and_host() {
        assert_eq!(basename("https://example.com/img/cat.png?size=large"), "cat.png");
        assert_eq!(basename("https://example.com/img/"), "img");
        assert_eq!(basename("https://example.com"), "download");
        assert_eq!(basename("https://example.com/"), "download");
    }
}
