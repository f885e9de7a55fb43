//! Job model: identifiers, lifecycle state and terminal outcome.
//!
//! A job lives only for the duration of one submit request. Its only
//! durable trace is the result file on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::decoder::StreamKind;
use crate::error::CoreError;
use crate::types::{JobId, Timestamp};
use crate::worker::JobPaths;

/// Hands out strictly increasing millisecond-timestamp ids.
///
/// Two jobs created in the same millisecond still get distinct ids, so
/// their result file names never collide.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    last: AtomicU64,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> JobId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Result file name for a job.
pub fn result_file_name(id: JobId) -> String {
    format!("result_{id}.csv")
}

/// Stored name for an uploaded input: `<id>-<field>-<original basename>`.
///
/// The form field keeps the two inputs of one job apart even when the
/// client sent them under the same file name.
pub fn upload_file_name(id: JobId, field: &str, original: &str) -> String {
    format!("{id}-{field}-{}", crate::upload::sanitize_file_name(original))
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Final result of a job, returned to the submitting client.
#[derive(Debug)]
pub enum JobOutcome {
    Success { result_file: String },
    Failure(CoreError),
}

/// One validation run.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    paths: JobPaths,
    result_name: String,
    state: JobState,
    stdout_text: String,
    stderr_text: String,
    created_at: Timestamp,
}

impl Job {
    /// Create a pending job. The result path is assigned now but only
    /// becomes a valid handle once the job succeeds.
    pub fn new(id: JobId, standard: PathBuf, subject: PathBuf, results_dir: &Path) -> Self {
        let result_name = result_file_name(id);
        Self {
            id,
            paths: JobPaths {
                standard,
                subject,
                result: results_dir.join(&result_name),
            },
            result_name,
            state: JobState::Pending,
            stdout_text: String::new(),
            stderr_text: String::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Accumulated worker text for a failure report: stderr when the
    /// worker wrote any, otherwise stdout.
    pub fn diagnostic(&self) -> &str {
        if self.stderr_text.is_empty() {
            &self.stdout_text
        } else {
            &self.stderr_text
        }
    }

    /// The result file name, only while the job has succeeded.
    pub fn result_file(&self) -> Option<&str> {
        (self.state == JobState::Succeeded).then_some(self.result_name.as_str())
    }

    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.state, JobState::Pending);
        self.state = JobState::Running;
    }

    pub fn append_diagnostic(&mut self, stream: StreamKind, line: &str) {
        let buf = match stream {
            StreamKind::Stdout => &mut self.stdout_text,
            StreamKind::Stderr => &mut self.stderr_text,
        };
        buf.push_str(line);
        buf.push('\n');
    }

    /// Resolve to success.
    pub fn succeed(&mut self) -> JobOutcome {
        debug_assert!(!self.state.is_terminal());
        self.state = JobState::Succeeded;
        JobOutcome::Success {
            result_file: self.result_name.clone(),
        }
    }

    /// Resolve to failure with the given error.
    pub fn fail(&mut self, error: CoreError) -> JobOutcome {
        debug_assert!(!self.state.is_terminal());
        self.state = JobState::Failed;
        JobOutcome::Failure(error)
    }
}
