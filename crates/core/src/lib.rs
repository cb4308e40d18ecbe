//! Domain logic for the BookVision job orchestrator.
//!
//! Everything here is HTTP-agnostic: the job model and its state machine,
//! the upload media policy, storage layout and intake, supervision of the
//! external transform tool, and verification of the artifacts it writes.
//! The `api` crate wires these pieces into an Axum server.

pub mod artifacts;
pub mod document;
pub mod error;
pub mod intake;
pub mod job;
pub mod layout;
pub mod media;
pub mod transform;
pub mod types;
