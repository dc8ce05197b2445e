use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "ok"; the service has no degraded mode.
    pub status: String,
    /// Number of rooms currently held in memory.
    pub active_rooms: usize,
}

impl HealthResponse {
    /// Create a health response reporting the active room count.
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_rooms,
        }
    }
}
