use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use medval_core::decoder::{LineDecoder, StreamKind};
use medval_core::error::CoreError;
use medval_core::events::JobEvent;
use medval_core::job::{result_file_name, upload_file_name, Job, JobIdGenerator, JobOutcome};
use medval_core::results::ResultStore;
use medval_core::types::JobId;
use medval_core::upload;
use medval_core::worker::{self, OutputStream, WorkerCommand};

use crate::ws::ObserverHub;

/// One uploaded input as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, unsanitized.
    pub file_name: String,
    pub data: Bytes,
}

/// A job submission: both files, in any order they arrived.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub standard: Option<UploadedFile>,
    pub subject: Option<UploadedFile>,
}

/// What one output stream contributed once it closed.
#[derive(Debug, Default)]
struct StreamReport {
    /// Every non-progress line, in order, for the failure diagnostic.
    lines: Vec<String>,
    /// How many `ERROR:` lines were seen.
    errors: usize,
}

/// Runs jobs end to end: validate, store inputs, launch the worker, relay
/// its events to observers, and resolve the outcome.
///
/// Jobs are independent; any number may run at once.
pub struct JobOrchestrator {
    worker: WorkerCommand,
    upload_dir: PathBuf,
    results: ResultStore,
    hub: Arc<ObserverHub>,
    ids: JobIdGenerator,
}

impl JobOrchestrator {
    pub fn new(
        worker: WorkerCommand,
        upload_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        hub: Arc<ObserverHub>,
    ) -> Self {
        Self {
            worker,
            upload_dir: upload_dir.into(),
            results: ResultStore::new(results_dir),
            hub,
            ids: JobIdGenerator::new(),
        }
    }

    /// Submit a job and wait for its outcome.
    ///
    /// The job runs on its own task, so it keeps going to completion even
    /// if the caller stops waiting.
    pub async fn submit(self: &Arc<Self>, request: JobRequest) -> JobOutcome {
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.process(request).await }).await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failure(CoreError::Internal(format!("Job task failed: {e}"))),
        }
    }

    /// Validate, store and run one submission on the current task.
    pub async fn process(&self, request: JobRequest) -> JobOutcome {
        let (standard, subject) = match validate(request) {
            Ok(files) => files,
            Err(e) => {
                tracing::info!(error = %e, "Rejected job submission");
                return JobOutcome::Failure(e);
            }
        };

        let id = self.ids.next_id();
        let standard_path = match self.store_upload(id, upload::FIELD_STANDARD, &standard).await {
            Ok(path) => path,
            Err(e) => return JobOutcome::Failure(e),
        };
        let subject_path = match self.store_upload(id, upload::FIELD_SUBJECT, &subject).await {
            Ok(path) => path,
            Err(e) => return JobOutcome::Failure(e),
        };

        let job = Job::new(id, standard_path, subject_path, self.results.dir());
        tracing::info!(
            job_id = id,
            standard = %standard.file_name,
            subject = %subject.file_name,
            "Job created",
        );
        self.run(job).await
    }

    /// Launch the worker for a stored job and drive it to a terminal state.
    pub async fn run(&self, mut job: Job) -> JobOutcome {
        let job_id = job.id();

        let process = match worker::spawn(&self.worker, job.paths()) {
            Ok(process) => process,
            Err(e) => {
                let err = CoreError::from(e);
                tracing::error!(job_id, error = %err, "Worker failed to launch");
                self.report_failure(&err).await;
                return job.fail(err);
            }
        };

        job.mark_running();
        tracing::info!(job_id, pid = ?process.pid(), "Worker launched");

        let (stdout, stderr, exit) = process.into_parts();
        let (out_report, err_report) =
            tokio::join!(self.drain(job_id, stdout), self.drain(job_id, stderr));

        for line in &out_report.lines {
            job.append_diagnostic(StreamKind::Stdout, line);
        }
        for line in &err_report.lines {
            job.append_diagnostic(StreamKind::Stderr, line);
        }

        let exit = match exit.wait().await {
            Ok(exit) => exit,
            Err(e) => {
                let err = CoreError::Internal(format!("Failed to reap worker: {e}"));
                tracing::error!(job_id, error = %err, "Worker wait failed");
                self.report_failure(&err).await;
                return job.fail(err);
            }
        };

        if !exit.success() {
            let err = CoreError::WorkerRuntime {
                exit_code: exit.code,
                diagnostic: job.diagnostic().to_string(),
            };
            tracing::warn!(
                job_id,
                exit_code = ?exit.code,
                duration_ms = exit.duration_ms,
                "Worker failed",
            );
            // The worker already explained itself on stderr.
            if out_report.errors + err_report.errors == 0 {
                self.report_failure(&err).await;
            }
            return job.fail(err);
        }

        // Success must hand back a result that can actually be read.
        if let Err(e) = self.results.read_rows(&result_file_name(job_id)).await {
            let result_path = job.paths().result.display().to_string();
            let diagnostic = match e {
                CoreError::NotFound { .. } => {
                    format!("Worker exited successfully but did not write {result_path}")
                }
                other => format!("Worker exited successfully but {result_path} is unreadable: {other}"),
            };
            let err = CoreError::WorkerRuntime {
                exit_code: exit.code,
                diagnostic,
            };
            tracing::warn!(job_id, error = %err, "Worker produced no usable result file");
            self.report_failure(&err).await;
            return job.fail(err);
        }

        tracing::info!(job_id, duration_ms = exit.duration_ms, "Job succeeded");
        job.succeed()
    }

    /// Decode one output stream to its end, relaying broadcast events to
    /// observers in the order they were produced.
    async fn drain(&self, job_id: JobId, mut stream: OutputStream) -> StreamReport {
        let mut decoder = LineDecoder::new(stream.kind());
        let mut report = StreamReport::default();

        while let Some(chunk) = stream.next_chunk().await {
            for event in decoder.feed(&chunk) {
                self.dispatch(job_id, event, &mut report).await;
            }
        }
        if let Some(event) = decoder.finish() {
            self.dispatch(job_id, event, &mut report).await;
        }
        report
    }

    async fn dispatch(&self, job_id: JobId, event: JobEvent, report: &mut StreamReport) {
        match &event {
            JobEvent::Progress { progress } => {
                tracing::debug!(job_id, progress, "Job progress");
            }
            JobEvent::Error { message } => {
                tracing::warn!(job_id, message = %message, "Worker reported error");
                report.errors += 1;
                report.lines.push(message.clone());
            }
            JobEvent::Log { text } => {
                tracing::debug!(job_id, text = %text, "Worker output");
                report.lines.push(text.clone());
            }
        }
        if event.is_broadcast() {
            self.hub.broadcast(&event).await;
        }
    }

    async fn report_failure(&self, err: &CoreError) {
        self.hub
            .broadcast(&JobEvent::Error {
                message: err.to_string(),
            })
            .await;
    }

    async fn store_upload(
        &self,
        id: JobId,
        field: &str,
        file: &UploadedFile,
    ) -> Result<PathBuf, CoreError> {
        let path = self.upload_dir.join(upload_file_name(id, field, &file.file_name));
        tokio::fs::write(&path, &file.data).await.map_err(|e| {
            CoreError::Storage(format!("Failed to store upload {}: {e}", path.display()))
        })?;
        Ok(path)
    }
}

/// Presence first, then extensions. Nothing is written on failure.
fn validate(request: JobRequest) -> Result<(UploadedFile, UploadedFile), CoreError> {
    let (standard, subject) = upload::require_both(request.standard, request.subject)?;
    upload::validate_standard(&standard.file_name)?;
    upload::validate_subject(&subject.file_name)?;
    Ok((standard, subject))
}
