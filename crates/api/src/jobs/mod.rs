//! Job orchestration: from an accepted submission to a terminal outcome.

pub mod orchestrator;

pub use orchestrator::{JobOrchestrator, JobRequest, UploadedFile};
