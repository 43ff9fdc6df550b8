//! Guest profile handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::state::AppState;
use crate::domain::models::Guest;
use crate::infrastructure::database::repositories::GuestUpdate;
use crate::infrastructure::database::GuestRepository;
use crate::shared::errors::{AppError, Result};

/// GET /api/users/{id}
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Guest>> {
    GuestRepository::find_by_id(&state.db, &id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User"))
}

/// PUT /api/users/{id}
pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<GuestUpdate>,
) -> Result<Json<Guest>> {
    GuestRepository::update_profile(&state.db, &id, update)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User"))
}

/// DELETE /api/users/{id}
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if !GuestRepository::delete(&state.db, &id).await? {
        return Err(AppError::NotFound("User"));
    }
    tracing::info!(guest_id = %id, "Guest deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
