//! Artifact verification and public URL composition.
//!
//! After the transform tool exits cleanly, [`ArtifactResolver::resolve`]
//! checks that both PDFs exist in the job's output directory and maps each
//! to `<static_prefix>/<job_id>/<file name>`. A clean exit without both
//! files is a failure. Resolution only reads the filesystem, so running it
//! again over the same directory yields the same result.

use std::io;
use std::path::{Path, PathBuf};

use crate::job::{ArtifactLocation, Artifacts};
use crate::transform::summary::TransformSummary;
use crate::types::JobId;

/// Fixed file name of the image-only PDF.
pub const ORIGINAL_ARTIFACT: &str = "original.pdf";

/// Fixed file name of the text-searchable PDF.
pub const DIGITAL_ARTIFACT: &str = "digital.pdf";

/// File locations suggested by the tool's stdout summary.
#[derive(Debug, Clone, Default)]
pub struct ArtifactHints {
    pub original: Option<PathBuf>,
    pub digital: Option<PathBuf>,
}

impl From<&TransformSummary> for ArtifactHints {
    fn from(summary: &TransformSummary) -> Self {
        Self {
            original: summary.original_pdf.as_deref().map(PathBuf::from),
            digital: summary.digital_pdf.as_deref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Missing artifacts: {}", missing.join(", "))]
    Missing { missing: Vec<String> },

    #[error("I/O error while checking artifacts: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    static_prefix: String,
}

impl ArtifactResolver {
    /// `static_prefix` is normalized to a leading `/` and no trailing `/`.
    pub fn new(static_prefix: &str) -> Self {
        Self {
            static_prefix: normalize_prefix(static_prefix),
        }
    }

    pub fn static_prefix(&self) -> &str {
        &self.static_prefix
    }

    /// Public URL of `file_name` in the output directory of `job_id`.
    pub fn url_for(&self, job_id: JobId, file_name: &str) -> String {
        format!("{}/{job_id}/{file_name}", self.static_prefix)
    }

    /// Verify both artifacts and compute their locations.
    pub async fn resolve(
        &self,
        job_id: JobId,
        output_dir: &Path,
        hints: &ArtifactHints,
    ) -> Result<Artifacts, ResolveError> {
        let original_name =
            artifact_file_name(job_id, output_dir, hints.original.as_deref(), ORIGINAL_ARTIFACT).await;
        let digital_name =
            artifact_file_name(job_id, output_dir, hints.digital.as_deref(), DIGITAL_ARTIFACT).await;

        let mut missing = Vec::new();
        for name in [&original_name, &digital_name] {
            if !is_file(&output_dir.join(name)).await? {
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::Missing { missing });
        }

        Ok(Artifacts {
            original: ArtifactLocation {
                path: output_dir.join(&original_name),
                url: self.url_for(job_id, &original_name),
            },
            digital: ArtifactLocation {
                path: output_dir.join(&digital_name),
                url: self.url_for(job_id, &digital_name),
            },
        })
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Pick the file name to verify: the hint's if it names a file directly
/// inside `output_dir`, otherwise the fixed default.
async fn artifact_file_name(
    job_id: JobId,
    output_dir: &Path,
    hint: Option<&Path>,
    default: &str,
) -> String {
    let Some(hint) = hint else {
        return default.to_string();
    };

    let candidate = if hint.is_absolute() {
        hint.to_path_buf()
    } else {
        output_dir.join(hint)
    };

    let (Some(parent), Some(name)) = (candidate.parent(), candidate.file_name()) else {
        return default.to_string();
    };

    let inside = match (
        tokio::fs::canonicalize(parent).await,
        tokio::fs::canonicalize(output_dir).await,
    ) {
        (Ok(parent), Ok(dir)) => parent == dir,
        _ => false,
    };

    match name.to_str() {
        Some(name) if inside => name.to_string(),
        _ => {
            tracing::warn!(
                job_id = %job_id,
                hint = %hint.display(),
                "Ignoring artifact hint outside the job output directory",
            );
            default.to_string()
        }
    }
}

async fn is_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn output_dir_with(files: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("job");
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        for f in files {
            tokio::fs::write(dir.join(f), b"%PDF-1.4").await.expect("write");
        }
        (root, dir)
    }

    #[tokio::test]
    async fn resolves_both_artifacts_to_static_urls() {
        let (_root, dir) = output_dir_with(&[ORIGINAL_ARTIFACT, DIGITAL_ARTIFACT]).await;
        let id = JobId::new();
        let artifacts = ArtifactResolver::new("/static")
            .resolve(id, &dir, &ArtifactHints::default())
            .await
            .expect("resolve");

        assert_eq!(artifacts.original.url, format!("/static/{id}/original.pdf"));
        assert_eq!(artifacts.digital.url, format!("/static/{id}/digital.pdf"));
        assert_eq!(artifacts.original.path, dir.join(ORIGINAL_ARTIFACT));
    }

    #[tokio::test]
    async fn resolving_twice_is_idempotent() {
        let (_root, dir) = output_dir_with(&[ORIGINAL_ARTIFACT, DIGITAL_ARTIFACT]).await;
        let id = JobId::new();
        let resolver = ArtifactResolver::new("/static");
        let first = resolver
            .resolve(id, &dir, &ArtifactHints::default())
            .await
            .expect("first");
        let second = resolver
            .resolve(id, &dir, &ArtifactHints::default())
            .await
            .expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_digital_is_reported() {
        let (_root, dir) = output_dir_with(&[ORIGINAL_ARTIFACT]).await;
        let result = ArtifactResolver::new("/static")
            .resolve(JobId::new(), &dir, &ArtifactHints::default())
            .await;
        assert_matches!(result, Err(ResolveError::Missing { missing }) if missing == vec![DIGITAL_ARTIFACT.to_string()]);
    }

    #[tokio::test]
    async fn missing_everything_lists_both() {
        let (_root, dir) = output_dir_with(&[]).await;
        let result = ArtifactResolver::new("/static")
            .resolve(JobId::new(), &dir, &ArtifactHints::default())
            .await;
        assert_matches!(result, Err(ResolveError::Missing { missing }) if missing.len() == 2);
    }

    #[tokio::test]
    async fn directory_named_like_an_artifact_does_not_count() {
        let (_root, dir) = output_dir_with(&[ORIGINAL_ARTIFACT]).await;
        tokio::fs::create_dir(dir.join(DIGITAL_ARTIFACT)).await.expect("mkdir");
        let result = ArtifactResolver::new("/static")
            .resolve(JobId::new(), &dir, &ArtifactHints::default())
            .await;
        assert_matches!(result, Err(ResolveError::Missing { .. }));
    }

    #[tokio::test]
    async fn hints_inside_output_dir_are_honoured() {
        let (_root, dir) = output_dir_with(&["scan.pdf", "scan_ocr.pdf"]).await;
        let id = JobId::new();
        let hints = ArtifactHints {
            original: Some(dir.join("scan.pdf")),
            digital: Some(PathBuf::from("scan_ocr.pdf")),
        };
        let artifacts = ArtifactResolver::new("/static")
            .resolve(id, &dir, &hints)
            .await
            .expect("resolve");
        assert_eq!(artifacts.original.url, format!("/static/{id}/scan.pdf"));
        assert_eq!(artifacts.digital.url, format!("/static/{id}/scan_ocr.pdf"));
    }

    #[tokio::test]
    async fn hints_outside_output_dir_fall_back_to_convention() {
        let (root, dir) = output_dir_with(&[ORIGINAL_ARTIFACT, DIGITAL_ARTIFACT]).await;
        tokio::fs::write(root.path().join("elsewhere.pdf"), b"x")
            .await
            .expect("write");
        let id = JobId::new();
        let hints = ArtifactHints {
            original: Some(root.path().join("elsewhere.pdf")),
            digital: Some(PathBuf::from("../elsewhere.pdf")),
        };
        let artifacts = ArtifactResolver::new("/static")
            .resolve(id, &dir, &hints)
            .await
            .expect("resolve");
        assert_eq!(artifacts.original.url, format!("/static/{id}/original.pdf"));
        assert_eq!(artifacts.digital.url, format!("/static/{id}/digital.pdf"));
    }

    #[test]
    fn prefix_is_normalized() {
        let id = JobId::new();
        assert_eq!(
            ArtifactResolver::new("files/").url_for(id, "a.pdf"),
            format!("/files/{id}/a.pdf")
        );
        assert_eq!(
            ArtifactResolver::new("/static").url_for(id, "a.pdf"),
            format!("/static/{id}/a.pdf")
        );
    }
}
