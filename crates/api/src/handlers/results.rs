//! Handlers for reading finished result files.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use medval_core::results::{paginate, ResultRow, ResultSummary};
use tokio_util::io::ReaderStream;

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::state::AppState;

/// GET /api/download/{filename}
///
/// Streams the raw result file as a CSV attachment.
pub async fn download_result(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<impl IntoResponse> {
    let file = state.results.open(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// GET /api/result/{filename}
///
/// Returns the parsed rows of a result file. With `limit` or `offset` the
/// response is a single page of rows.
pub async fn get_result_rows(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Vec<ResultRow>>> {
    let rows = state.results.read_rows(&filename).await?;
    if !params.is_paged() {
        return Ok(Json(rows));
    }
    Ok(Json(paginate(&rows, params.limit, params.offset).to_vec()))
}

/// GET /api/result/{filename}/summary
///
/// Counts of conforming and non-conforming fields in a result file.
pub async fn get_result_summary(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Json<ResultSummary>> {
    let rows = state.results.read_rows(&filename).await?;
    Ok(Json(ResultSummary::from_rows(&rows)))
}
