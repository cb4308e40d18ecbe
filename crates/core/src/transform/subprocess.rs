//! Child process management for the transform tool.
//!
//! Provides [`run_command`]: spawn, read stdout/stderr until the pipes close
//! (or a short grace period after exit runs out), and race process exit against the timeout and the
//! cancellation token. A process that loses the race is killed and reaped.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::{TransformError, TransformOutput};
use crate::types::JobId;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output beyond this is still drained and logged but not retained.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to wait for the reader tasks once the process is gone.
///
/// Grandchildren that inherited the pipes can keep them open after the
/// tool itself has exited.
/// Once it runs out, the readers are stopped and keep what they have.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Size of each read from a pipe. Memory per stream stays bounded even when
/// the tool never writes a newline.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// A line longer than this is logged in pieces.
const MAX_LOG_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

enum Exit {
    Status(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawn `cmd`, capture its output, and enforce `timeout`.
///
/// The caller sets the program and arguments; stdio wiring is applied here.
pub async fn run_command(
    cmd: &mut Command,
    job_id: JobId,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<TransformOutput, TransformError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    // `kill_on_drop(true)` also covers the case where this future is dropped.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|source| TransformError::Spawn { program, source })?;

    tracing::debug!(job_id = %job_id, pid = child.id(), "Transform process spawned");

    let stop_readers = CancellationToken::new();
    let stdout_task = spawn_reader(
        child.stdout.take(),
        job_id,
        StreamKind::Stdout,
        stop_readers.clone(),
    );
    let stderr_task = spawn_reader(
        child.stderr.take(),
        job_id,
        StreamKind::Stderr,
        stop_readers.clone(),
    );

    let exit = tokio::select! {
        status = child.wait() => Exit::Status(status),
        _ = tokio::time::sleep(timeout) => Exit::TimedOut,
        _ = cancel.cancelled() => Exit::Cancelled,
    };

    match exit {
        Exit::Status(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let (stdout, stderr) =
                collect_both(stdout_task, stderr_task, &stop_readers, job_id).await;
            let exit_code = status.code().unwrap_or(-1);

            tracing::debug!(job_id = %job_id, exit_code, duration_ms, "Transform process exited");

            Ok(TransformOutput {
                stdout,
                stderr,
                exit_code,
                duration_ms,
            })
        }
        Exit::Status(Err(e)) => Err(TransformError::Io(e)),
        Exit::TimedOut => {
            kill(&mut child, job_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            stdout_task.abort();
            let stderr = collect(stderr_task, &stop_readers, job_id, StreamKind::Stderr).await;
            Err(TransformError::Timeout { elapsed_ms, stderr })
        }
        Exit::Cancelled => {
            kill(&mut child, job_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            stdout_task.abort();
            let stderr = collect(stderr_task, &stop_readers, job_id, StreamKind::Stderr).await;
            Err(TransformError::Cancelled { elapsed_ms, stderr })
        }
    }
}

/// Kill the child and reap it so no zombie is left behind.
async fn kill(child: &mut tokio::process::Child, job_id: JobId) {
    if let Err(e) = child.kill().await {
        tracing::warn!(job_id = %job_id, error = %e, "Failed to kill transform process");
    }
}

fn spawn_reader<R>(
    handle: Option<R>,
    job_id: JobId,
    kind: StreamKind,
    stop: CancellationToken,
) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move { read_stream(handle, job_id, kind, stop).await })
}

/// Read a stream until EOF or `stop`, logging it line by line and keeping at
/// most [`MAX_OUTPUT_BYTES`]. On `stop` the bytes read so far are returned.
async fn read_stream<R: AsyncRead + Unpin>(
    handle: Option<R>,
    job_id: JobId,
    kind: StreamKind,
    stop: CancellationToken,
) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut handle) = handle else {
        return buf;
    };

    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut line = Vec::new();
    loop {
        // `read` is cancel-safe, so stopping never loses consumed bytes.
        let n = tokio::select! {
            biased;
            read = handle.read(&mut chunk) => match read {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, stream = kind.as_str(), error = %e, "Failed reading transform output");
                    break;
                }
            },
            _ = stop.cancelled() => break,
        };
        if n == 0 {
            break;
        }
        let data = &chunk[..n];

        let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&data[..n.min(room)]);

        line.extend_from_slice(data);
        while let Some(pos) = line.iter().position(|b| *b == b'\n') {
            log_line(job_id, kind, &line[..pos]);
            line.drain(..=pos);
        }
        if line.len() > MAX_LOG_LINE_BYTES {
            log_line(job_id, kind, &line);
            line.clear();
        }
    }
    if !line.is_empty() {
        log_line(job_id, kind, &line);
    }
    buf
}

fn log_line(job_id: JobId, kind: StreamKind, line: &[u8]) {
    tracing::debug!(
        job_id = %job_id,
        stream = kind.as_str(),
        "{}",
        String::from_utf8_lossy(line).trim_end()
    );
}

/// Wait up to [`DRAIN_GRACE`] for a reader to hit EOF, then stop it and keep
/// whatever it has read.
async fn collect(
    mut task: JoinHandle<Vec<u8>>,
    stop: &CancellationToken,
    job_id: JobId,
    kind: StreamKind,
) -> String {
    let joined = match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(
                job_id = %job_id,
                stream = kind.as_str(),
                "Output pipe still open after the process exited, keeping partial output",
            );
            stop.cancel();
            task.await
        }
    };
    match joined {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!(job_id = %job_id, stream = kind.as_str(), error = %e, "Transform output reader failed");
            String::new()
        }
    }
}

/// Collect both streams concurrently so the grace period is shared.
async fn collect_both(
    stdout_task: JoinHandle<Vec<u8>>,
    stderr_task: JoinHandle<Vec<u8>>,
    stop: &CancellationToken,
    job_id: JobId,
) -> (String, String) {
    tokio::join!(
        collect(stdout_task, stop, job_id, StreamKind::Stdout),
        collect(stderr_task, stop, job_id, StreamKind::Stderr),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
