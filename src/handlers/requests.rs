//! Guest service request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use super::state::AppState;
use crate::domain::models::{GuestRequest, RequestPriority, RequestStatus};
use crate::infrastructure::database::repositories::{NewGuestRequest, RequestUpdate};
use crate::infrastructure::database::GuestRequestRepository;
use crate::realtime::ADMIN_ROOM;
use crate::shared::errors::{AppError, Result};

/// `status` and `priority` accept `all` to mean no filter
#[derive(Debug, Default, Deserialize)]
pub struct RequestFilterParams {
    pub status: Option<String>,
    pub priority: Option<String>,
}

fn parse_filter<T: FromStr<Err = String>>(value: Option<&str>) -> Result<Option<T>> {
    match value.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(raw) => T::from_str(raw).map(Some).map_err(AppError::Validation),
    }
}

/// GET /api/requests
pub async fn list_requests_handler(
    State(state): State<AppState>,
    Query(params): Query<RequestFilterParams>,
) -> Result<Json<Value>> {
    let status: Option<RequestStatus> = parse_filter(params.status.as_deref())?;
    let priority: Option<RequestPriority> = parse_filter(params.priority.as_deref())?;

    let requests = GuestRequestRepository::list(&state.db, status, priority).await?;
    Ok(Json(json!({ "total": requests.len(), "requests": requests })))
}

/// POST /api/requests
pub async fn create_request_handler(
    State(state): State<AppState>,
    Json(request): Json<NewGuestRequest>,
) -> Result<(StatusCode, Json<GuestRequest>)> {
    if request.user_id.trim().is_empty() || request.request_type.trim().is_empty() {
        return Err(AppError::Validation(
            "user_id and request_type are required".to_string(),
        ));
    }

    let created = GuestRequestRepository::create(&state.db, request).await?;
    state
        .hub
        .publish(ADMIN_ROOM, "guest_request", json!({ "request": created }));
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/requests/{id}/status
pub async fn update_request_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RequestUpdate>,
) -> Result<Json<Value>> {
    let updated = GuestRequestRepository::update(&state.db, &id, update)
        .await?
        .ok_or(AppError::NotFound("Guest request"))?;
    tracing::info!(request_id = %id, status = %updated.status, "Guest request updated");
    Ok(Json(json!({ "success": true, "request": updated })))
}
