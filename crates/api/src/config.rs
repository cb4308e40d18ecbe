use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `900`).
    ///
    /// Must exceed the transform timeout, since `POST /api/process` waits for
    /// the job by default.
    pub request_timeout_secs: u64,
    /// Grace period for in-flight jobs on shutdown, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// URL prefix the output root is served under (default: `/static`).
    pub static_prefix: String,
    pub upload: UploadConfig,
    pub transform: TransformConfig,
}

/// Upload intake and storage settings.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Where stored uploads land (default: `storage/uploads`).
    pub upload_dir: PathBuf,
    /// Root of the per-job output directories (default: `storage/output`).
    pub output_dir: PathBuf,
    /// Per-upload byte limit (default: 500 MiB).
    pub max_upload_bytes: u64,
    /// Accept `image/*` in addition to `video/*` (default: `true`).
    pub allow_image_uploads: bool,
}

/// External transform tool and job engine settings.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Executable to run (default: `bookvision-transform`).
    pub tool: String,
    /// Whitespace-separated arguments placed before `--input`.
    pub tool_args: Vec<String>,
    /// Forwarded as `--tool-path-override` when set.
    pub tool_path_override: Option<String>,
    /// Wall-clock limit per process (default: 600s).
    pub timeout: Duration,
    /// Processes allowed to run at once (default: `2`).
    pub max_concurrent_jobs: usize,
    /// How long terminal jobs stay queryable (default: 24h).
    pub job_retention: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `5000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`         | `900`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                       |
    /// | `STATIC_PREFIX`                | `/static`                  |
    /// | `UPLOAD_DIR`                   | `storage/uploads`          |
    /// | `OUTPUT_DIR`                   | `storage/output`           |
    /// | `MAX_UPLOAD_BYTES`             | `524288000`                |
    /// | `ALLOW_IMAGE_UPLOADS`          | `true`                     |
    /// | `TRANSFORM_TOOL`               | `bookvision-transform`     |
    /// | `TRANSFORM_TOOL_ARGS`          | *(empty)*                  |
    /// | `TRANSFORM_TOOL_PATH_OVERRIDE` | *(unset)*                  |
    /// | `TRANSFORM_TIMEOUT_SECS`       | `600`                      |
    /// | `MAX_CONCURRENT_JOBS`          | `2`                        |
    /// | `JOB_RETENTION_SECS`           | `86400`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let static_prefix = std::env::var("STATIC_PREFIX").unwrap_or_else(|_| "/static".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            static_prefix,
            upload: UploadConfig::from_env(),
            transform: TransformConfig::from_env(),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "storage/uploads".into())
            .into();

        let output_dir = std::env::var("OUTPUT_DIR")
            .unwrap_or_else(|_| "storage/output".into())
            .into();

        let max_upload_bytes: u64 = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "524288000".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid u64");

        let allow_image_uploads: bool = std::env::var("ALLOW_IMAGE_UPLOADS")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("ALLOW_IMAGE_UPLOADS must be `true` or `false`");

        Self {
            upload_dir,
            output_dir,
            max_upload_bytes,
            allow_image_uploads,
        }
    }
}

impl TransformConfig {
    pub fn from_env() -> Self {
        let tool = std::env::var("TRANSFORM_TOOL").unwrap_or_else(|_| "bookvision-transform".into());

        let tool_args: Vec<String> = std::env::var("TRANSFORM_TOOL_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let tool_path_override = std::env::var("TRANSFORM_TOOL_PATH_OVERRIDE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let timeout_secs: u64 = std::env::var("TRANSFORM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("TRANSFORM_TIMEOUT_SECS must be a valid u64");

        let max_concurrent_jobs: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("MAX_CONCURRENT_JOBS must be a valid usize");
        assert!(max_concurrent_jobs > 0, "MAX_CONCURRENT_JOBS must be at least 1");

        let retention_secs: u64 = std::env::var("JOB_RETENTION_SECS")
            .unwrap_or_else(|_| "86400".into())
            .parse()
            .expect("JOB_RETENTION_SECS must be a valid u64");

        Self {
            tool,
            tool_args,
            tool_path_override,
            timeout: Duration::from_secs(timeout_secs),
            max_concurrent_jobs,
            job_retention: Duration::from_secs(retention_secs),
        }
    }
}
