//! HTTP surface of the prediction service.
//!
//! Two equivalent entry points expose the same operation: `POST /predict`
//! with a JSON body and `GET /predict?q=...`. Both run the identical
//! pipeline: derive a client identifier from proxy headers, consult the
//! rate limiter, validate the question, invoke the engine, and map the
//! outcome onto the response contract. `GET /health` is a liveness probe.
//!
//! User-facing error strings are Dutch; the `code` field in error bodies is
//! the stable machine-readable kind clients should key on.

use std::sync::{Arc, Mutex};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::ServiceError;
use crate::predictions::PredictionEngine;
use crate::ratelimit::{RateLimiter, RealClock};

/// Identifier bucket for clients that arrive without proxy headers. All of
/// them share one rate-limit window.
const UNKNOWN_CLIENT: &str = "unknown";

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Shared server state: the engine and the admission-control window.
///
/// The limiter lives behind a `Mutex` because request tasks run on a
/// multi-threaded runtime; checks are short and never held across an await.
pub struct AppState {
    engine: PredictionEngine,
    limiter: Mutex<RateLimiter<RealClock>>,
}

impl AppState {
    pub fn new(engine: PredictionEngine, config: &Config) -> Self {
        Self {
            engine,
            limiter: Mutex::new(RateLimiter::with_defaults(config.rate_limit.clone())),
        }
    }
}

/// Build the service router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(post_predict).get(get_predict))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn post_predict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            info!("rejecting malformed request body: {rejection}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Ongeldige aanvraag",
                "invalid_body",
            );
        }
    };

    let question = body.get("question").and_then(Value::as_str);
    handle_predict(&state, &headers, question).await
}

#[derive(serde::Deserialize)]
struct PredictQuery {
    q: Option<String>,
}

async fn get_predict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PredictQuery>,
) -> Response {
    handle_predict(&state, &headers, query.q.as_deref()).await
}

/// The shared pipeline behind both entry points.
async fn handle_predict(
    state: &AppState,
    headers: &HeaderMap,
    question: Option<&str>,
) -> Response {
    let client_id = client_identifier(headers);

    let (allowed, remaining, retry_after) = {
        let mut limiter = state.limiter.lock().expect("rate limiter lock poisoned");
        let allowed = limiter.is_allowed(&client_id);
        (allowed, limiter.remaining(&client_id), limiter.retry_after(&client_id))
    };

    if !allowed {
        info!("rate limit exceeded for {client_id}");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(RATE_LIMIT_REMAINING_HEADER, remaining.to_string())],
            Json(json!({
                "error": "Te veel aanvragen. Probeer het later opnieuw.",
                "code": "rate_limited",
                "retryAfter": retry_after,
            })),
        )
            .into_response();
    }

    let sanitized = match crate::validation::validate_question(question) {
        Ok(sanitized) => sanitized,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, &err.to_string(), err.code());
        }
    };

    match state.engine.generate(&sanitized).await {
        Ok(result) => (
            StatusCode::OK,
            [(RATE_LIMIT_REMAINING_HEADER, remaining.to_string())],
            Json(result),
        )
            .into_response(),
        Err(ServiceError::Credentials(details)) => {
            error!("credential failure: {details}");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "De voorspellingsdienst is niet correct geconfigureerd",
                "missing_credentials",
            )
        }
        Err(ServiceError::UpstreamRateLimit(details)) => {
            error!("upstream rate limit: {details}");
            error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "De voorspellingsdienst is tijdelijk overbelast. Probeer het later opnieuw.",
                "upstream_rate_limit",
            )
        }
        Err(err) => {
            error!("unexpected generation failure: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Er is een onverwachte fout opgetreden",
                "internal_error",
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

/// Derive the rate-limit identifier from proxy headers: the first address in
/// `x-forwarded-for`, else `x-real-ip`, else a shared sentinel.
fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    UNKNOWN_CLIENT.to_string()
}
