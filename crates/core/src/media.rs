//! Upload media-type allow-list and filename sanitization.
//!
//! The declared `Content-Type` of the multipart field is authoritative. When
//! a client sends none (or the generic `application/octet-stream`), the type
//! is inferred from the file extension using a fixed table. The client
//! filename never reaches a filesystem path: only a sanitized extension and
//! a display title are derived from it.

use crate::intake::IntakeError;

/// Generic binary type browsers send when they cannot guess.
const OCTET_STREAM: &str = "application/octet-stream";

/// Longest extension kept from a client filename.
const MAX_EXTENSION_LEN: usize = 8;

/// Longest title derived from a client filename.
const MAX_TITLE_LEN: usize = 200;

/// Extension → media type for inference and default extensions.
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

/// An upload that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMedia {
    pub kind: MediaKind,
    /// Lowercased type without parameters, e.g. `video/mp4`.
    pub media_type: String,
    /// Extension used for the stored file, without the dot.
    pub extension: String,
}

/// Which media families intake accepts.
#[derive(Debug, Clone, Copy)]
pub struct MediaPolicy {
    pub allow_images: bool,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self { allow_images: true }
    }
}

impl MediaPolicy {
    /// Check a declared content type (and, as a fallback, the filename)
    /// against the allow-list.
    pub fn classify(
        &self,
        declared: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<AcceptedMedia, IntakeError> {
        let extension = file_name.and_then(sanitize_extension);

        let media_type = match declared.map(normalize_media_type) {
            Some(t) if !t.is_empty() && t != OCTET_STREAM => t,
            _ => extension
                .as_deref()
                .and_then(media_type_for_extension)
                .map(str::to_string)
                .ok_or_else(|| IntakeError::UnsupportedMedia {
                    media_type: declared.unwrap_or_default().to_string(),
                })?,
        };

        let kind = if media_type.starts_with("video/") {
            MediaKind::Video
        } else if media_type.starts_with("image/") && self.allow_images {
            MediaKind::Image
        } else {
            return Err(IntakeError::UnsupportedMedia { media_type });
        };

        let extension = extension
            .or_else(|| extension_for_media_type(&media_type).map(str::to_string))
            .unwrap_or_else(|| "bin".to_string());

        Ok(AcceptedMedia {
            kind,
            media_type,
            extension,
        })
    }
}

/// Strip parameters and case from a media type (`Video/MP4; codecs=x` → `video/mp4`).
fn normalize_media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    KNOWN_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, t)| *t)
}

fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    KNOWN_EXTENSIONS
        .iter()
        .find(|(_, t)| *t == media_type)
        .map(|(e, _)| *e)
}

/// Final path component of a client filename, accepting both separators.
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
}

/// Extract a safe, lowercase, alphanumeric extension from a client filename.
///
/// Returns `None` when there is no extension or it contains anything other
/// than ASCII letters and digits.
pub fn sanitize_extension(file_name: &str) -> Option<String> {
    let base = base_name(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Human title derived from a client filename: base name without extension,
/// control characters dropped, whitespace collapsed.
pub fn title_from_file_name(file_name: &str) -> Option<String> {
    let base = base_name(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let title: String = stem
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_TITLE_LEN)
        .collect();
    (!title.is_empty()).then_some(title)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn accepts_declared_video() {
        let media = MediaPolicy::default()
            .classify(Some("video/mp4"), Some("book.mp4"))
            .expect("accept");
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.media_type, "video/mp4");
        assert_eq!(media.extension, "mp4");
    }

    #[test]
    fn normalizes_case_and_parameters() {
        let media = MediaPolicy::default()
            .classify(Some("Video/WebM; codecs=vp9"), Some("clip.WEBM"))
            .expect("accept");
        assert_eq!(media.media_type, "video/webm");
        assert_eq!(media.extension, "webm");
    }

    #[test]
    fn rejects_text() {
        let err = MediaPolicy::default()
            .classify(Some("text/plain"), Some("notes.txt"))
            .unwrap_err();
        assert_matches!(err, IntakeError::UnsupportedMedia { ref media_type } if media_type == "text/plain");
        assert_eq!(err.to_string(), "Unsupported media type");
    }

    #[test]
    fn images_follow_the_policy_switch() {
        let open = MediaPolicy { allow_images: true };
        let closed = MediaPolicy {
            allow_images: false,
        };
        assert_eq!(
            open.classify(Some("image/png"), Some("page.png"))
                .expect("accept")
                .kind,
            MediaKind::Image
        );
        assert_matches!(
            closed.classify(Some("image/png"), Some("page.png")),
            Err(IntakeError::UnsupportedMedia { .. })
        );
    }

    #[test]
    fn octet_stream_falls_back_to_extension() {
        let media = MediaPolicy::default()
            .classify(Some("application/octet-stream"), Some("lecture.mov"))
            .expect("accept");
        assert_eq!(media.media_type, "video/quicktime");
        assert_eq!(media.extension, "mov");
    }

    #[test]
    fn missing_type_with_unknown_extension_is_rejected() {
        assert_matches!(
            MediaPolicy::default().classify(None, Some("payload.exe")),
            Err(IntakeError::UnsupportedMedia { .. })
        );
        assert_matches!(
            MediaPolicy::default().classify(None, None),
            Err(IntakeError::UnsupportedMedia { .. })
        );
    }

    #[test]
    fn default_extension_comes_from_media_type() {
        let media = MediaPolicy::default()
            .classify(Some("video/x-matroska"), Some("no-extension"))
            .expect("accept");
        assert_eq!(media.extension, "mkv");

        let media = MediaPolicy::default()
            .classify(Some("video/3gpp"), None)
            .expect("accept");
        assert_eq!(media.extension, "bin");
    }

    #[test]
    fn sanitize_extension_strips_traversal() {
        assert_eq!(
            sanitize_extension("../../etc/cron.d/evil.mp4").as_deref(),
            Some("mp4")
        );
        assert_eq!(
            sanitize_extension("C:\\Users\\me\\Videos\\Book.MP4").as_deref(),
            Some("mp4")
        );
        assert_eq!(sanitize_extension("evil.mp4/../x"), None);
        assert_eq!(sanitize_extension("weird.mp$4"), None);
        assert_eq!(sanitize_extension(".hidden"), None);
        assert_eq!(sanitize_extension("noext"), None);
        assert_eq!(sanitize_extension("long.abcdefghijk"), None);
    }

    #[test]
    fn title_from_file_name_strips_path_and_extension() {
        assert_eq!(
            title_from_file_name("/tmp/My   Book\tScan.mp4").as_deref(),
            Some("My Book Scan")
        );
        assert_eq!(title_from_file_name("chapter1").as_deref(), Some("chapter1"));
        assert_eq!(title_from_file_name(""), None);
    }
}
