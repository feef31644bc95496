//! Collection handlers.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, RawQuery, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
};
use serde_json::Value;
use url::form_urlencoded;

use crate::api::state::AppState;
use crate::domain::{ApiResponse, Document, ListResponse, SearchQuery, SearchResponse};
use crate::error::{AppError, Result};

/// List a collection through the query pipeline.
pub async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<ApiResponse<ListResponse>>> {
    let raw: Vec<(String, String)> = query
        .as_deref()
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let base_url = base_url(&state, &headers, uri.path());
    let page = state
        .document_service
        .list(&collection, &raw, &base_url)
        .await?;

    Ok(Json(ApiResponse::success(page)))
}

/// Keyword search.
pub async fn search(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<SearchResponse>>> {
    let results = state
        .document_service
        .search(&collection, &query.q)
        .await?;

    Ok(Json(ApiResponse::success(results)))
}

/// Create a document.
pub async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Document>>)> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let document = state.document_service.create(&collection, body).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(document))))
}

/// Fetch one document with its relations populated.
pub async fn get_one(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Document>>> {
    let document = state.document_service.get(&collection, &id).await?;
    Ok(Json(ApiResponse::success(document)))
}

/// Soft-delete a document.
pub async fn delete_one(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>> {
    state.document_service.soft_delete(&collection, &id).await?;
    Ok(Json(ApiResponse::ok()))
}

/// Absolute URL of the current path as seen by the client.
fn base_url(state: &AppState, headers: &HeaderMap, path: &str) -> String {
    let value_of = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let scheme = value_of("x-forwarded-proto").unwrap_or("http");
    let host = value_of("x-forwarded-host")
        .or_else(|| value_of(header::HOST.as_str()))
        .unwrap_or("localhost");
    let prefix = state.config.server.base_path_prefix.trim_end_matches('/');

    format!("{scheme}://{host}{prefix}{path}")
}
