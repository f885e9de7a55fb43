//! Spawning the worker and streaming its output.
//!
//! Each output pipe is drained by its own task into a bounded channel, so
//! the consumer sees a lazy, finite sequence of chunks that ends when the
//! pipe closes. The exit status is only reported once both pipes have
//! closed and the process has been reaped.

use std::io;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::command::{JobPaths, WorkerCommand};
use crate::decoder::StreamKind;
use crate::error::CoreError;

/// Chunks buffered per stream before the reader waits for the consumer.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Read buffer size for each output pipe.
const READ_BUF_BYTES: usize = 8 * 1024;

/// Errors raised while launching or reaping the worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker executable not found: {0}")]
    NotFound(String),

    #[error("Permission denied launching worker: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<WorkerError> for CoreError {
    fn from(err: WorkerError) -> Self {
        CoreError::Launch(err.to_string())
    }
}

/// Terminal status of a worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Wall-clock duration from spawn to reap.
    pub duration_ms: u64,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// One output pipe of a running worker.
#[derive(Debug)]
pub struct OutputStream {
    kind: StreamKind,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl OutputStream {
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Next raw chunk, or `None` once the pipe has closed.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// Resolves to the worker's exit status after both pipes are closed.
#[derive(Debug)]
pub struct ExitHandle(JoinHandle<Result<WorkerExit, WorkerError>>);

impl ExitHandle {
    pub async fn wait(self) -> Result<WorkerExit, WorkerError> {
        self.0
            .await
            .map_err(|e| WorkerError::Io(io::Error::other(e)))?
    }
}

/// A launched worker process.
#[derive(Debug)]
pub struct WorkerProcess {
    pid: Option<u32>,
    stdout: OutputStream,
    stderr: OutputStream,
    exit: ExitHandle,
}

impl WorkerProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn into_parts(self) -> (OutputStream, OutputStream, ExitHandle) {
        (self.stdout, self.stderr, self.exit)
    }
}

/// Launch the worker for one job.
///
/// Fails immediately if the program cannot be started; no streams are
/// produced in that case.
pub fn spawn(command: &WorkerCommand, paths: &JobPaths) -> Result<WorkerProcess, WorkerError> {
    let mut cmd = command.build(paths);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => WorkerError::NotFound(command.program().to_string()),
        io::ErrorKind::PermissionDenied => {
            WorkerError::PermissionDenied(command.program().to_string())
        }
        _ => WorkerError::Io(e),
    })?;
    let pid = child.id();

    let (stdout_tx, stdout_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
    let (stderr_tx, stderr_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);

    let stdout_task = tokio::spawn(pump(child.stdout.take(), stdout_tx));
    let stderr_task = tokio::spawn(pump(child.stderr.take(), stderr_tx));

    let exit = tokio::spawn(async move {
        // Pipes close before (or as) the process exits; waiting on the
        // pumps first guarantees every chunk was handed over.
        let _ = stdout_task.await;
        let _ = stderr_task.await;
        let status = child.wait().await?;
        Ok(WorkerExit {
            code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    });

    Ok(WorkerProcess {
        pid,
        stdout: OutputStream {
            kind: StreamKind::Stdout,
            rx: stdout_rx,
        },
        stderr: OutputStream {
            kind: StreamKind::Stderr,
            rx: stderr_rx,
        },
        exit: ExitHandle(exit),
    })
}

/// Copy a pipe into the channel until EOF.
///
/// If the consumer goes away the pipe is still drained so the worker never
/// blocks on a full pipe buffer.
async fn pump<R: AsyncRead + Unpin>(handle: Option<R>, tx: mpsc::Sender<Vec<u8>>) {
    let Some(mut reader) = handle else {
        return;
    };
    let mut buf = vec![0u8; READ_BUF_BYTES];
    let mut consumer_alive = true;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if consumer_alive && tx.send(buf[..n].to_vec()).await.is_err() {
                    consumer_alive = false;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Worker pipe read failed");
                break;
            }
        }
    }
}
