//! Store account and lookup handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::error::Result;
use crate::routes::json_body;
use crate::services::auth::{AuthService, LoginRequest, RegisterStore, StoreSession};
use crate::services::stores::{QrPayload, StoreDirectory};
use crate::state::AppState;

/// Envelope for single-store responses.
#[derive(Debug, Serialize)]
pub struct StoreEnvelope<T> {
    pub store: T,
}

fn auth_service(state: &AppState) -> AuthService<'_> {
    let backends = state.backends();
    AuthService::new(
        backends.stores.as_ref(),
        state.tokens(),
        backends.clock.as_ref(),
        &state.config().base_url,
    )
}

/// `POST /api/store/register`
pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<RegisterStore>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let form = json_body(body)?;
    let session = auth_service(&state).register(form).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /api/store/login`
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<StoreSession>> {
    let form = json_body(body)?;
    let session = auth_service(&state)
        .login(&form.email, &form.password)
        .await?;
    Ok(Json(session))
}

/// `GET /api/store/{storeId}`
pub async fn public_profile(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<impl IntoResponse> {
    let store = StoreDirectory::new(state.backends().stores.as_ref(), &state.config().base_url)
        .public_profile(&store_id)
        .await?;
    Ok(Json(StoreEnvelope { store }))
}

/// `GET /api/store/validate/{storeId}`
pub async fn validate(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<impl IntoResponse> {
    let store = StoreDirectory::new(state.backends().stores.as_ref(), &state.config().base_url)
        .validate(&store_id)
        .await?;
    Ok(Json(StoreEnvelope { store }))
}

/// `GET /api/store/{storeId}/qr`
pub async fn qr(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<QrPayload>> {
    let payload = StoreDirectory::new(state.backends().stores.as_ref(), &state.config().base_url)
        .qr(&store_id)
        .await?;
    Ok(Json(payload))
}
