pub mod documents;
pub mod jobs;
pub mod process;
