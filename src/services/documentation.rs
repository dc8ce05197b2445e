use utoipa::OpenApi;

use crate::{
    dto::{
        health::HealthResponse,
        rooms::{AccessRequest, JoinQrCodes, JoinToken, RoomAccessResponse},
    },
    routes,
};

/// OpenAPI document covering the provisioning and health routes.
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::healthcheck,
        routes::rooms::create_room,
        routes::rooms::room_access,
        routes::rooms::refresh_ref_tokens,
        routes::websocket::ws_handler,
    ),
    components(schemas(
        HealthResponse,
        AccessRequest,
        RoomAccessResponse,
        JoinQrCodes,
        JoinToken,
    ))
)]
pub struct ApiDoc;
