#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Worker launch failed: {0}")]
    Launch(String),

    /// The worker ran but did not exit cleanly. `exit_code` is `None` when
    /// the process was terminated by a signal.
    #[error("Worker failed with exit code {}", display_code(.exit_code))]
    WorkerRuntime {
        exit_code: Option<i32>,
        diagnostic: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}
