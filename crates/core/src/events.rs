//! Job events pushed to live observers, and their wire type constants.
//!
//! Events are serialized internally-tagged on `"type"`:
//!
//! ```text
//! {"type": "progress", "progress": 50.0}
//! {"type": "error", "message": "bad header"}
//! ```

use serde::{Deserialize, Serialize};

/// Progress update during job execution (percentage, 0-100).
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Error reported by the worker or by the job itself.
pub const MSG_TYPE_ERROR: &str = "error";

/// Free-form worker output. Kept for diagnostics, never broadcast.
pub const MSG_TYPE_LOG: &str = "log";

/// A typed notification produced while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    Progress { progress: f64 },
    Error { message: String },
    Log { text: String },
}

impl JobEvent {
    /// Whether this event is pushed to observers. Log lines only feed the
    /// failure diagnostic.
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, JobEvent::Log { .. })
    }

    /// The wire `type` tag for this event.
    pub fn message_type(&self) -> &'static str {
        match self {
            JobEvent::Progress { .. } => MSG_TYPE_PROGRESS,
            JobEvent::Error { .. } => MSG_TYPE_ERROR,
            JobEvent::Log { .. } => MSG_TYPE_LOG,
        }
    }

    /// Serialize to the JSON text frame sent to observers.
    pub fn to_json(&self) -> String {
        // A tagged enum of strings and finite floats always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}
