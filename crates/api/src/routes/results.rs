//! Route definitions for result access.

use axum::routing::get;
use axum::Router;

use crate::handlers::results;
use crate::state::AppState;

/// ```text
/// GET    /api/download/{filename}          -> download_result
/// GET    /api/result/{filename}            -> get_result_rows
/// GET    /api/result/{filename}/summary    -> get_result_summary
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/download/{filename}", get(results::download_result))
        .route("/api/result/{filename}", get(results::get_result_rows))
        .route(
            "/api/result/{filename}/summary",
            get(results::get_result_summary),
        )
}
