use std::sync::Arc;

use bookvision_core::artifacts::ArtifactResolver;
use bookvision_core::document::DocumentStore;
use bookvision_core::layout::StorageLayout;
use bookvision_core::media::MediaPolicy;
use bookvision_core::transform::executor::TransformExecutor;

use crate::config::ServerConfig;
use crate::engine::{JobDispatcher, JobTracker};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Upload and output directory layout.
    pub layout: StorageLayout,
    /// Which declared media types intake accepts.
    pub media_policy: MediaPolicy,
    /// Authoritative job status record.
    pub tracker: Arc<JobTracker>,
    /// Runs accepted jobs in the background.
    pub dispatcher: Arc<JobDispatcher>,
    /// External document record collaborator.
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Wire the job engine from configuration.
    ///
    /// Storage roots are not created here; call
    /// [`StorageLayout::ensure_roots`] before serving.
    pub fn new(
        config: ServerConfig,
        executor: Arc<dyn TransformExecutor>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let layout = StorageLayout::new(
            config.upload.upload_dir.clone(),
            config.upload.output_dir.clone(),
        );
        let media_policy = MediaPolicy {
            allow_images: config.upload.allow_image_uploads,
        };
        let tracker = Arc::new(JobTracker::new());
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&tracker),
            executor,
            ArtifactResolver::new(&config.static_prefix),
            layout.clone(),
            Arc::clone(&documents),
            config.transform.max_concurrent_jobs,
        ));

        Self {
            config: Arc::new(config),
            layout,
            media_policy,
            tracker,
            dispatcher,
            documents,
        }
    }
}
