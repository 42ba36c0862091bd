use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::order::{NewOrder, Order};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/:id", get(get_order))
        .route("/restaurants/:id/pending", get(pending_orders))
}

/// Placement entry point for the (external) checkout flow. The engine
/// queues the order for the restaurant and broadcasts the refreshed queue.
async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = state.engine.place_order(payload)?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .engine
        .order(id)?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(Json(order))
}

/// The restaurant's live queue, most-recent-first.
async fn pending_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Json<Vec<Order>> {
    Json(state.pending.snapshot(id))
}
