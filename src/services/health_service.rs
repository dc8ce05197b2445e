use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload and the live room count.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.registry().room_count())
}
