//! Handler for job submission.

use axum::extract::{Multipart, State};
use axum::Json;
use medval_core::job::JobOutcome;
use medval_core::upload::{FIELD_STANDARD, FIELD_SUBJECT};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::jobs::{JobRequest, UploadedFile};
use crate::state::AppState;

/// Body returned when a job succeeds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    /// Name to pass to the download and result endpoints.
    pub result_file: String,
}

/// POST /api/upload
///
/// Accepts a multipart form with a `standard` file and a `validation` file,
/// runs the worker over them and responds once the job reaches a terminal
/// state. Progress is pushed to observers on `/ws` while it runs.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<SubmitResponse>> {
    let mut request = JobRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        let slot = match name.as_str() {
            FIELD_STANDARD => &mut request.standard,
            FIELD_SUBJECT => &mut request.subject,
            _ => continue,
        };
        let file_name = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        *slot = Some(UploadedFile { file_name, data });
    }

    match state.orchestrator.submit(request).await {
        JobOutcome::Success { result_file } => Ok(Json(SubmitResponse {
            success: true,
            result_file,
        })),
        JobOutcome::Failure(err) => Err(err.into()),
    }
}
