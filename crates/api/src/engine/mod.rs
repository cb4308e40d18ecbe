//! Job engine: status tracking and background dispatch.

pub mod dispatcher;
pub mod tracker;

pub use dispatcher::JobDispatcher;
pub use tracker::{JobCounts, JobTracker};
