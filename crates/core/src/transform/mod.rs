//! Supervision of the external transform tool.
//!
//! The tool is an opaque program that turns one uploaded video or image into
//! `original.pdf` and `digital.pdf`. This module builds its command line,
//! runs it as a child process with captured output, a wall-clock limit and
//! cancellation, and parses the optional JSON summary it prints on stdout.

pub mod executor;
pub mod subprocess;
pub mod summary;
pub mod tool;
