//! Periodic eviction of finished jobs from the tracker.
//!
//! Terminal jobs stay queryable through `GET /api/jobs/{id}` for the
//! retention period, then are dropped. Files on disk are left alone.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::engine::JobTracker;

/// Upper bound on the sweep interval.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Lower bound on the sweep interval.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Run the retention sweep loop until `cancel` is triggered.
///
/// Sweeps every quarter of the retention period, clamped to between one
/// second and one hour.
pub async fn run(tracker: Arc<JobTracker>, retention: Duration, cancel: CancellationToken) {
    let sweep_interval = (retention / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
    let retention_delta = match chrono::Duration::from_std(retention) {
        Ok(delta) => delta,
        Err(e) => {
            tracing::error!(error = %e, "Job retention period out of range, sweeper disabled");
            return;
        }
    };

    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = sweep_interval.as_secs(),
        "Job retention sweeper started"
    );

    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - retention_delta;
                let evicted = tracker.evict_terminal_before(cutoff).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Job retention: evicted finished jobs");
                } else {
                    tracing::debug!("Job retention: nothing to evict");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
