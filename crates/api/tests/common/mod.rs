#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bookvision_api::config::{ServerConfig, TransformConfig, UploadConfig};
use bookvision_api::router::build_app_router;
use bookvision_api::state::AppState;
use bookvision_core::document::InMemoryDocumentStore;
use bookvision_core::transform::tool::TransformTool;

pub const BOUNDARY: &str = "bookvision-test-boundary";

/// Tool body that writes both artifacts and prints a summary.
pub const WRITES_BOTH: &str = r#"
echo "[OCR_PIPELINE] Extracting frames"
echo "PDF original" > "$OUT/original.pdf"
echo "PDF digital" > "$OUT/digital.pdf"
echo "{\"success\": true, \"original_pdf\": \"$OUT/original.pdf\", \"digital_pdf\": \"$OUT/digital.pdf\"}"
"#;

/// Knobs that differ between tests.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub transform_timeout: Duration,
    pub max_upload_bytes: u64,
    pub allow_images: bool,
    pub request_timeout_secs: u64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            transform_timeout: Duration::from_secs(20),
            max_upload_bytes: 1024 * 1024,
            allow_images: true,
            request_timeout_secs: 30,
        }
    }
}

/// A fully wired app over a temp directory and a bash fake transform tool.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub root: tempfile::TempDir,
}

impl TestApp {
    pub async fn new(tool_body: &str) -> Self {
        Self::with_options(tool_body, TestOptions::default()).await
    }

    /// `tool_body` runs after the preamble has parsed `--input` into `$IN`
    /// and `--output-dir` into `$OUT`, and touched `$ROOT/invoked`.
    pub async fn with_options(tool_body: &str, options: TestOptions) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let script = write_tool(root.path(), tool_body);

        let config = test_config(root.path(), &script, &options);
        let tool = TransformTool {
            program: config.transform.tool.clone(),
            leading_args: config.transform.tool_args.clone(),
            tool_path_override: config.transform.tool_path_override.clone(),
            timeout: config.transform.timeout,
        };

        let state = AppState::new(
            config.clone(),
            Arc::new(tool),
            Arc::new(InMemoryDocumentStore::new()),
        );
        state.layout.ensure_roots().await.expect("storage roots");

        let app = build_app_router(state.clone(), &config);
        Self { app, state, root }
    }

    pub fn tool_invoked(&self) -> bool {
        self.root.path().join("invoked").exists()
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.app.clone(), uri).await
    }

    pub async fn upload(&self, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
        post_multipart(self.app.clone(), uri, parts).await
    }
}

/// Build a test `ServerConfig` rooted at `root`, running `script` with bash.
pub fn test_config(root: &Path, script: &Path, options: &TestOptions) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: options.request_timeout_secs,
        shutdown_timeout_secs: 5,
        static_prefix: "/static".to_string(),
        upload: UploadConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("output"),
            max_upload_bytes: options.max_upload_bytes,
            allow_image_uploads: options.allow_images,
        },
        transform: TransformConfig {
            tool: "bash".to_string(),
            tool_args: vec![script.to_string_lossy().into_owned()],
            tool_path_override: None,
            timeout: options.transform_timeout,
            max_concurrent_jobs: 2,
            job_retention: Duration::from_secs(3600),
        },
    }
}

fn write_tool(root: &Path, body: &str) -> PathBuf {
    let script = format!(
        r#"#!/usr/bin/env bash
ROOT='{root}'
IN=''
OUT=''
while [ $# -gt 0 ]; do
  case "$1" in
    --input) IN="$2"; shift 2 ;;
    --output-dir) OUT="$2"; shift 2 ;;
    *) shift ;;
  esac
done
touch "$ROOT/invoked"
{body}
"#,
        root = root.display(),
    );
    let path = root.join("fake-transform.sh");
    std::fs::write(&path, script).expect("write tool");
    path
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One part of a multipart form.
pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Shorthand for a `file` part.
pub fn file_part<'a>(file_name: &'a str, content_type: &'a str, data: &'a [u8]) -> Part<'a> {
    Part::File {
        name: "file",
        file_name,
        content_type: Some(content_type),
        data,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                    )
                    .as_bytes(),
                );
                if let Some(ct) = content_type {
                    body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
                }
                body.extend_from_slice(b"\r\n");
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Number of entries directly inside `dir`.
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
