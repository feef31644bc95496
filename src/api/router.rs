//! Router setup and configuration.

use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::api::handlers::{collection, health, sequence};
use crate::api::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Health and metrics routes
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics));

    // Sequential ID routes
    let sequence_routes = Router::new()
        .route("/v1/sequences/{name}/preview", get(sequence::preview))
        .route("/v1/sequences/{name}/next", post(sequence::next));

    // Collection routes
    let collection_routes = Router::new()
        .route(
            "/v1/{collection}",
            get(collection::list).post(collection::create),
        )
        .route("/v1/{collection}/search", get(collection::search))
        .route(
            "/v1/{collection}/{id}",
            get(collection::get_one).delete(collection::delete_one),
        );

    Router::new()
        .merge(health_routes)
        .merge(sequence_routes)
        .merge(collection_routes)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
