use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::event::CompleteDelivery;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/deliveries/complete", post(complete_delivery))
}

#[derive(Serialize)]
struct CompletionResponse {
    message: &'static str,
    order: Order,
}

/// Courier confirms the handover with the customer's verification code.
/// Rejections carry a distinct reason (`already_delivered`, `invalid_code`)
/// so the courier app knows whether to stop retrying.
async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompleteDelivery>,
) -> Result<Json<CompletionResponse>, AppError> {
    let order = state.engine.complete_delivery(&payload)?;

    Ok(Json(CompletionResponse {
        message: "Order delivered successfully",
        order,
    }))
}
