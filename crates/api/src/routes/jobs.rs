//! Route definitions for job submission.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// ```text
/// POST   /api/upload      -> submit_job
/// ```
///
/// The request stays open until the job finishes, so this router must not
/// sit behind the request timeout.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(jobs::submit_job))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
