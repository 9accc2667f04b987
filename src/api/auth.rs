//! API-key access control for the classify routes.
//!
//! A key may arrive as an `X-API-Key` header, an `Authorization: Bearer`
//! token, or an `api_key` query parameter (checked in that order). Missing
//! key → 401, unknown key → 403, both with JSON envelopes. The resolved
//! client name is attached to the request for handlers to echo back.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::config::ApiKey;

use super::AppState;
use super::routes::error_response;

/// Valid API keys, resolved to client names.
pub struct ApiKeyRegistry {
    keys: Vec<ApiKey>,
}

impl ApiKeyRegistry {
    pub fn new(keys: Vec<ApiKey>) -> Self {
        Self { keys }
    }

    /// Resolve a presented key to its client name.
    pub fn client_for(&self, presented: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.key.expose_secret() == presented)
            .map(|k| k.client.as_str())
    }
}

/// Client name resolved by the middleware, available as a request extension.
#[derive(Debug, Clone)]
pub struct ApiClient(pub String);

/// Middleware guarding the classify routes.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(presented) = extract_key(&request) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "API key required",
            "Please provide API key via X-API-Key header or Bearer token",
        );
    };

    let Some(client) = state.keys.client_for(&presented) else {
        warn!("Rejected request with invalid API key");
        return error_response(
            StatusCode::FORBIDDEN,
            "Invalid API key",
            "The provided API key is not valid",
        );
    };

    request.extensions_mut().insert(ApiClient(client.to_string()));
    next.run(request).await
}

/// Pull the presented key out of the request, header forms first.
fn extract_key(request: &Request) -> Option<String> {
    let headers = request.headers();

    if let Some(value) = headers.get("x-api-key") {
        return value.to_str().ok().map(str::to_string);
    }
    if let Some(value) = headers.get("authorization") {
        return value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
    }
    request
        .uri()
        .query()
        .and_then(|q| {
            q.split('&')
                .find_map(|pair| pair.strip_prefix("api_key="))
        })
        .map(str::to_string)
}
