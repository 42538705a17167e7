//! Print retrieval handler.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use printdrop_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::StoreAuth;
use crate::services::print::{PrintJob, PrintService};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PrintResponse {
    pub order: PrintJob,
}

/// `GET /api/store/orders/print/{orderId}`
pub async fn retrieve(
    State(state): State<AppState>,
    StoreAuth(claims): StoreAuth,
    Path(order_id): Path<String>,
) -> Result<Json<PrintResponse>> {
    // A malformed ID cannot name an order
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| AppError::NotFound("Order not found or expired".to_string()))?;

    let order = PrintService::new(
        state.backends(),
        state.config().order_ttl,
        state.converter(),
    )
    .retrieve(&claims, order_id)
    .await?;

    Ok(Json(PrintResponse { order }))
}
