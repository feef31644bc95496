//! Sequential ID handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
};

use crate::api::state::AppState;
use crate::domain::{ApiResponse, SequenceIdResponse, SequenceOptions};
use crate::error::{AppError, Result};

/// Preview the next ID of a sequence without committing it.
pub async fn preview(
    State(state): State<AppState>,
    Path(name): Path<String>,
    options: std::result::Result<Query<SequenceOptions>, QueryRejection>,
) -> Result<Json<ApiResponse<SequenceIdResponse>>> {
    let Query(options) = options.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let id = state.sequence_service.preview_next(&name, &options).await?;

    Ok(Json(ApiResponse::success(SequenceIdResponse { name, id })))
}

/// Commit the next ID of a sequence.
///
/// The body is optional; an empty body uses the default options.
pub async fn next(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<SequenceIdResponse>>> {
    let options: SequenceOptions = if body.iter().all(u8::is_ascii_whitespace) {
        SequenceOptions::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid sequence options: {e}")))?
    };

    let id = state
        .sequence_service
        .increment_and_format(&name, &options)
        .await?;

    Ok(Json(ApiResponse::success(SequenceIdResponse { name, id })))
}
