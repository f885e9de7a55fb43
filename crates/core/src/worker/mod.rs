//! Worker process adapter.
//!
//! Launches the external validation program once per job and exposes its
//! stdout/stderr as chunk streams plus a terminal exit status. The adapter
//! never retries and never pools processes; a failed launch is reported
//! immediately as a [`WorkerError`].

mod command;
mod process;

pub use command::{JobPaths, WorkerCommand};
pub use process::{spawn, ExitHandle, OutputStream, WorkerError, WorkerExit, WorkerProcess};
