//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Stores
//! POST /api/store/register              - Register, returns token and QR payload
//! POST /api/store/login                 - Log in, returns token and QR payload
//! GET  /api/store/{storeId}             - Public store profile
//! GET  /api/store/validate/{storeId}    - Resolve an upload target
//! GET  /api/store/{storeId}/qr          - QR payload
//!
//! # Customer upload
//! POST /api/upload                      - Multipart upload, creates an order
//!
//! # Dashboard (bearer token)
//! GET  /api/store/orders                - Live orders of the token's store
//! PUT  /api/store/orders                - Status action on one of them
//! GET  /api/store/orders/{storeId}      - Same, path must match the token
//! PUT  /api/store/orders/{storeId}      - Same, path must match the token
//! GET  /api/store/orders/print/{orderId} - Order files for printing
//! ```

pub mod orders;
pub mod print;
pub mod stores;
pub mod upload;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::{AppError, ValidationError};
use crate::middleware::{auth_rate_limiter, rate_limit_rejection, request_id_middleware};
use crate::state::AppState;

/// Unwrap a JSON body, reporting a bad one as a validation failure.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ValidationError::Malformed(rejection.body_text()).into())
}

/// Register and login, rate limited per client IP when enabled.
fn credential_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(stores::register))
        .route("/login", post(stores::login));

    if state.config().rate_limit {
        router
            .layer(auth_rate_limiter())
            .layer(axum_middleware::map_response(rate_limit_rejection))
    } else {
        router
    }
}

/// Dashboard routes; every handler requires a store token.
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list_own).put(orders::update_own))
        .route(
            "/{store_id}",
            get(orders::list_for_store).put(orders::update_for_store),
        )
        .route("/print/{order_id}", get(print::retrieve))
}

/// Create all API routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    let body_limit = state.config().upload.body_limit();

    Router::new()
        .nest("/api/store/orders", order_routes())
        .route("/api/store/validate/{store_id}", get(stores::validate))
        .route("/api/store/{store_id}", get(stores::public_profile))
        .route("/api/store/{store_id}/qr", get(stores::qr))
        .nest("/api/store", credential_routes(state))
        .route(
            "/api/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// The full application: routes, health checks and the middleware stack.
///
/// Used by the server binary and by router tests.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(&state))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backends().orders.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
