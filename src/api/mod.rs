//! HTTP surface — thin axum layer over the decision engine.
//!
//! Routing, JSON parsing, key checks, and error envelopes live here; all
//! classification semantics stay in `pipeline`.

pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::normalize::EmailNormalizer;
use crate::pipeline::engine::DecisionEngine;

use auth::ApiKeyRegistry;

/// Shared state for all routes. Everything inside is read-only after
/// startup, so handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub normalizer: Arc<EmailNormalizer>,
    pub keys: Arc<ApiKeyRegistry>,
    pub max_batch: usize,
}

/// Build the service router.
///
/// `/` and `/health` are open; the classify routes sit behind the API-key
/// middleware. CORS is permissive, matching the deployed service.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/classify", post(routes::classify))
        .route("/classify/batch", post(routes::classify_batch))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/", get(routes::service_info))
        .route("/health", get(routes::health))
        .merge(protected)
        .fallback(routes::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
