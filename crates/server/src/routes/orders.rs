//! Store dashboard handlers.
//!
//! Each operation is reachable two ways: scoped by the token alone, or with
//! the store in the path, which must then match the token.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Serialize;

use printdrop_core::StoreCode;

use crate::error::{AppError, Result};
use crate::middleware::StoreAuth;
use crate::models::PrintOrder;
use crate::routes::json_body;
use crate::services::orders::{OrderList, OrderService, StatusUpdate};
use crate::state::AppState;

/// Response to a status update.
#[derive(Debug, Serialize)]
pub struct UpdatedOrder {
    pub order: PrintOrder,
}

/// Resolve the path store, which must be the token's.
fn path_store(auth: &StoreAuth, raw: &str) -> Result<StoreCode> {
    let code = StoreCode::parse(raw)
        .map_err(|_| AppError::Forbidden("Token does not belong to this store".to_string()))?;
    auth.authorize(&code)?;
    Ok(code)
}

async fn list(state: &AppState, store: &StoreCode) -> Result<Json<OrderList>> {
    let list = OrderService::new(state.backends(), state.config().order_ttl)
        .list_active(store)
        .await?;
    Ok(Json(list))
}

async fn update(
    state: &AppState,
    store: &StoreCode,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedOrder>> {
    let StatusUpdate { order_id, action } = json_body(body)?;
    let order = OrderService::new(state.backends(), state.config().order_ttl)
        .apply(store, order_id, action)
        .await?;
    Ok(Json(UpdatedOrder { order }))
}

/// `GET /api/store/orders`
pub async fn list_own(
    State(state): State<AppState>,
    StoreAuth(claims): StoreAuth,
) -> Result<Json<OrderList>> {
    list(&state, &claims.store_id).await
}

/// `PUT /api/store/orders`
pub async fn update_own(
    State(state): State<AppState>,
    StoreAuth(claims): StoreAuth,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedOrder>> {
    update(&state, &claims.store_id, body).await
}

/// `GET /api/store/orders/{storeId}`
pub async fn list_for_store(
    State(state): State<AppState>,
    auth: StoreAuth,
    Path(store_id): Path<String>,
) -> Result<Json<OrderList>> {
    let store = path_store(&auth, &store_id)?;
    list(&state, &store).await
}

/// `PUT /api/store/orders/{storeId}`
pub async fn update_for_store(
    State(state): State<AppState>,
    auth: StoreAuth,
    Path(store_id): Path<String>,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<UpdatedOrder>> {
    let store = path_store(&auth, &store_id)?;
    update(&state, &store, body).await
}
