use tracing::info;

use crate::{dto::rooms::RoomAccessResponse, error::ServiceError, state::SharedState};

/// Create a fresh room and return its credential bundle.
pub fn create_room(state: &SharedState) -> RoomAccessResponse {
    let access = state.registry().create_room();
    info!(room_id = %access.room_id, "provisioned room");
    access.into()
}

/// Re-fetch a room's credential bundle; the caller must present the
/// admin PIN.
pub fn room_access(
    state: &SharedState,
    room_id: &str,
    admin_pin: &str,
) -> Result<RoomAccessResponse, ServiceError> {
    let registry = state.registry();
    if registry.room_state(room_id).is_none() {
        return Err(ServiceError::RoomNotFound);
    }
    registry
        .room_access(room_id, admin_pin)
        .map(Into::into)
        .ok_or(ServiceError::InvalidPin)
}

/// Rotate all three referee tokens and return the fresh bundle.
pub fn refresh_ref_tokens(
    state: &SharedState,
    room_id: &str,
    admin_pin: &str,
) -> Result<RoomAccessResponse, ServiceError> {
    let registry = state.registry();
    if !registry.verify_admin_pin(room_id, admin_pin) {
        if registry.room_state(room_id).is_none() {
            return Err(ServiceError::RoomNotFound);
        }
        return Err(ServiceError::InvalidPin);
    }
    registry
        .rotate_referee_tokens(room_id)
        .map(Into::into)
        .ok_or(ServiceError::RoomNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn access_distinguishes_unknown_room_from_bad_pin() {
        let state = AppState::new();
        let created = create_room(&state);

        let err = room_access(&state, "ZZZZ", &created.admin_pin).unwrap_err();
        assert_eq!(err, ServiceError::RoomNotFound);

        let err = room_access(&state, &created.room_id, "wrong").unwrap_err();
        assert_eq!(err, ServiceError::InvalidPin);

        let fetched = room_access(&state, &created.room_id, &created.admin_pin).unwrap();
        assert_eq!(fetched.room_id, created.room_id);
        assert_eq!(
            fetched.join_qr_codes.left.token,
            created.join_qr_codes.left.token
        );
    }

    #[tokio::test]
    async fn refresh_requires_the_pin_and_changes_every_token() {
        let state = AppState::new();
        let created = create_room(&state);

        let err = refresh_ref_tokens(&state, &created.room_id, "wrong").unwrap_err();
        assert_eq!(err, ServiceError::InvalidPin);
        let err = refresh_ref_tokens(&state, "ZZZZ", &created.admin_pin).unwrap_err();
        assert_eq!(err, ServiceError::RoomNotFound);

        let rotated = refresh_ref_tokens(&state, &created.room_id, &created.admin_pin).unwrap();
        assert_ne!(
            rotated.join_qr_codes.left.token,
            created.join_qr_codes.left.token
        );
        assert_ne!(
            rotated.join_qr_codes.center.token,
            created.join_qr_codes.center.token
        );
        assert_ne!(
            rotated.join_qr_codes.right.token,
            created.join_qr_codes.right.token
        );
        assert_eq!(rotated.admin_pin, created.admin_pin);
    }
}
