use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::{
    dto::rooms::{AccessRequest, RoomAccessResponse},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes handling room provisioning (creation and credential access).
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}/access", post(room_access))
        .route(
            "/rooms/{room_id}/refresh-ref-tokens",
            post(refresh_ref_tokens),
        )
}

/// Create a fresh room and return its credentials.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Room created", body = RoomAccessResponse)
    )
)]
pub async fn create_room(State(state): State<SharedState>) -> Json<RoomAccessResponse> {
    Json(room_service::create_room(&state))
}

/// Re-fetch a room's credentials using the admin PIN.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/access",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room code")),
    request_body = AccessRequest,
    responses(
        (status = 200, description = "Credentials returned", body = RoomAccessResponse),
        (status = 403, description = "PIN does not match"),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn room_access(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<RoomAccessResponse>, AppError> {
    let access = room_service::room_access(&state, &room_id, &payload.admin_pin)?;
    Ok(Json(access))
}

/// Rotate all referee tokens for a room using the admin PIN.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/refresh-ref-tokens",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room code")),
    request_body = AccessRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = RoomAccessResponse),
        (status = 403, description = "PIN does not match"),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn refresh_ref_tokens(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<RoomAccessResponse>, AppError> {
    let access = room_service::refresh_ref_tokens(&state, &room_id, &payload.admin_pin)?;
    Ok(Json(access))
}
