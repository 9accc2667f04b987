//! Route handlers and wire types.

use std::collections::BTreeMap;

use axum::extract::{Extension, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::pipeline::engine::BatchSummary;
use crate::pipeline::types::{Label, RawEmail, Verdict};

use super::AppState;
use super::auth::ApiClient;

/// Batch echo truncation limits, matching the deployed API.
const ECHO_SUBJECT_CHARS: usize = 50;
const ECHO_BODY_CHARS: usize = 100;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Run the normalizer over the body first. Defaults to true.
    pub preprocess: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    #[serde(flatten)]
    verdict: Verdict,
    client: String,
    timestamp: DateTime<Utc>,
    preprocessing_applied: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub emails: Vec<RawEmail>,
    pub preprocess: Option<bool>,
}

/// Truncated echo of what was actually classified.
#[derive(Debug, Serialize)]
struct InputEcho {
    subject: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct BatchItem {
    #[serde(flatten)]
    verdict: Verdict,
    input: InputEcho,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    results: Vec<BatchItem>,
    total: usize,
    summary: BTreeMap<Label, usize>,
    needs_review_count: usize,
    client: String,
    timestamp: DateTime<Utc>,
}

/// JSON error envelope shared by every failure path.
pub fn error_response(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(json!({ "error": error, "message": message.into() })),
    )
        .into_response()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── Open routes ─────────────────────────────────────────────────────

/// GET / — service information.
pub async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Lead Triage API",
        "version": env!("CARGO_PKG_VERSION"),
        "model": "3-stage hierarchical classifier (abuse → spam → intent)",
        "classes": ["HOT", "WARM", "COLD", "SPAM", "ABUSE"],
        "status": "healthy",
        "timestamp": Utc::now(),
        "endpoints": {
            "/classify": "POST - Classify single email (requires API key)",
            "/classify/batch": "POST - Classify multiple emails (requires API key)",
            "/health": "GET - Health check (no auth required)"
        },
        "authentication": "API key required via X-API-Key header or Bearer token"
    }))
}

/// GET /health — liveness check, no auth.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now() }))
}

pub async fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Endpoint not found",
        "Unknown endpoint",
    )
}

// ── Classification routes ───────────────────────────────────────────

/// POST /classify — classify one email.
pub async fn classify(
    State(state): State<AppState>,
    Extension(client): Extension<ApiClient>,
    Json(request): Json<ClassifyRequest>,
) -> Response {
    if request.body.is_empty() && request.subject.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Email body or subject required",
            "Provide at least one of body or subject",
        );
    }

    let preprocess = request.preprocess.unwrap_or(true);
    let mut body = request.body;
    let mut preprocessing_applied = false;
    if preprocess && !body.is_empty() {
        body = state.normalizer.normalize(&body, &request.subject);
        preprocessing_applied = true;
    }

    match state.engine.classify(&body, &request.subject) {
        Ok(verdict) => {
            info!(
                client = %client.0,
                label = %verdict.label,
                stage = verdict.stage.as_str(),
                confidence = verdict.confidence,
                "Classified email"
            );
            Json(ClassifyResponse {
                verdict,
                client: client.0,
                timestamp: Utc::now(),
                preprocessing_applied,
            })
            .into_response()
        }
        Err(e) => {
            error!(client = %client.0, error = %e, "Classification failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Classification failed",
                e.to_string(),
            )
        }
    }
}

/// POST /classify/batch — classify up to `max_batch` emails in order.
pub async fn classify_batch(
    State(state): State<AppState>,
    Extension(client): Extension<ApiClient>,
    Json(request): Json<BatchRequest>,
) -> Response {
    if request.emails.len() > state.max_batch {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Batch too large",
            format!("Maximum {} emails per batch", state.max_batch),
        );
    }

    let preprocess = request.preprocess.unwrap_or(true);
    let emails: Vec<RawEmail> = request
        .emails
        .into_iter()
        .map(|email| {
            let body = if preprocess && !email.body.is_empty() {
                state.normalizer.normalize(&email.body, &email.subject)
            } else {
                email.body
            };
            RawEmail {
                subject: email.subject,
                body,
            }
        })
        .collect();

    let verdicts = match state.engine.classify_batch(&emails) {
        Ok(verdicts) => verdicts,
        Err(e) => {
            error!(client = %client.0, error = %e, "Batch classification failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Batch classification failed",
                e.to_string(),
            );
        }
    };

    let summary = BatchSummary::from_verdicts(&verdicts);
    info!(
        client = %client.0,
        total = summary.total,
        needs_review = summary.needs_review_count,
        "Classified batch"
    );

    let results: Vec<BatchItem> = verdicts
        .into_iter()
        .zip(&emails)
        .map(|(verdict, email)| BatchItem {
            verdict,
            input: InputEcho {
                subject: truncate_chars(&email.subject, ECHO_SUBJECT_CHARS),
                body: truncate_chars(&email.body, ECHO_BODY_CHARS),
            },
        })
        .collect();

    Json(BatchResponse {
        total: summary.total,
        results,
        summary: summary.counts,
        needs_review_count: summary.needs_review_count,
        client: client.0,
        timestamp: Utc::now(),
    })
    .into_response()
}
