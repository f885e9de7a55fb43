use std::path::PathBuf;
use std::time::Duration;

use medval_core::worker::WorkerCommand;

use crate::ws::HeartbeatConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Timeout for result and health routes. Job submission is exempt.
    pub request_timeout_secs: u64,
    /// Where uploaded inputs are stored.
    pub upload_dir: PathBuf,
    /// Where the worker writes result files.
    pub results_dir: PathBuf,
    /// Interpreter or executable that runs the worker.
    pub worker_program: String,
    /// Script passed to `worker_program` ahead of the job paths. Empty
    /// means the program is invoked with the job paths only.
    pub worker_script: String,
    /// Seconds between pings to each observer.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which an observer is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Upper bound on a submit request body.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3001`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `UPLOAD_DIR`              | `uploads`               |
    /// | `RESULTS_DIR`             | `results`               |
    /// | `WORKER_PROGRAM`          | `python`                |
    /// | `WORKER_SCRIPT`           | `process.py`            |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`                    |
    /// | `HEARTBEAT_TIMEOUT_SECS`  | `90`                    |
    /// | `MAX_UPLOAD_BYTES`        | `104857600`             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
        let results_dir = std::env::var("RESULTS_DIR").unwrap_or_else(|_| "results".into());

        let worker_program = std::env::var("WORKER_PROGRAM").unwrap_or_else(|_| "python".into());
        let worker_script = std::env::var("WORKER_SCRIPT").unwrap_or_else(|_| "process.py".into());

        let heartbeat_interval_secs: u64 = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HEARTBEAT_INTERVAL_SECS must be a valid u64");

        let heartbeat_timeout_secs: u64 = std::env::var("HEARTBEAT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "90".into())
            .parse()
            .expect("HEARTBEAT_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "104857600".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
            worker_program,
            worker_script,
            heartbeat_interval_secs,
            heartbeat_timeout_secs,
            max_upload_bytes,
        };
        config.validate();
        config
    }

    /// Panic on settings the server cannot run with.
    pub fn validate(&self) {
        assert!(
            self.heartbeat_interval_secs > 0,
            "HEARTBEAT_INTERVAL_SECS must be greater than zero"
        );
        assert!(
            self.heartbeat_timeout_secs >= self.heartbeat_interval_secs,
            "HEARTBEAT_TIMEOUT_SECS must be at least HEARTBEAT_INTERVAL_SECS"
        );
    }

    /// The command used to launch one worker per job.
    pub fn worker_command(&self) -> WorkerCommand {
        let command = WorkerCommand::new(self.worker_program.clone());
        if self.worker_script.is_empty() {
            command
        } else {
            command.with_leading_args([self.worker_script.clone()])
        }
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(self.heartbeat_interval_secs),
            timeout: Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}
