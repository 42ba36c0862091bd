use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::profile::{CourierProfile, Restaurant, UserProfile};
use crate::state::AppState;

/// Seeding surface for the in-memory profile directory. Profile CRUD
/// proper lives in an external service; these routes mirror just enough of
/// it for the dispatch engine's lookups.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/restaurants", post(upsert_restaurant))
        .route("/users", post(upsert_user))
        .route("/couriers", post(upsert_courier))
        .route("/couriers/:id/availability", patch(set_availability))
}

async fn upsert_restaurant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Restaurant>,
) -> Result<Json<Restaurant>, AppError> {
    require_name(&payload.name)?;
    state.profiles.upsert_restaurant(payload.clone());
    Ok(Json(payload))
}

async fn upsert_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserProfile>,
) -> Result<Json<UserProfile>, AppError> {
    require_name(&payload.name)?;
    state.profiles.upsert_user(payload.clone());
    Ok(Json(payload))
}

async fn upsert_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CourierProfile>,
) -> Result<Json<CourierProfile>, AppError> {
    require_name(&payload.name)?;
    state.profiles.upsert_courier(payload.clone());
    Ok(Json(payload))
}

#[derive(Deserialize)]
struct AvailabilityRequest {
    is_available: bool,
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<CourierProfile>, AppError> {
    let courier = state
        .profiles
        .set_courier_availability(id, payload.is_available)
        .ok_or_else(|| AppError::NotFound(format!("courier {id}")))?;

    Ok(Json(courier))
}

fn require_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    Ok(())
}
