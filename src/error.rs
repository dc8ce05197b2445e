use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Errors surfaced by admission checks and command handling.
///
/// Every variant maps to one entry of the wire error vocabulary shared
/// by HTTP responses and WebSocket acks; see [`ServiceError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No room exists under the given identifier.
    #[error("room not found")]
    RoomNotFound,
    /// The provided admin PIN does not match the room's PIN.
    #[error("invalid admin pin")]
    InvalidPin,
    /// The provided referee token does not match the current token for
    /// that position (it may have been rotated mid-connection).
    #[error("invalid referee token")]
    InvalidToken,
    /// The connection's bound role does not allow this command.
    #[error("not authorised")]
    NotAuthorised,
    /// The command carried an action this endpoint does not know.
    #[error("unknown action")]
    UnknownAction,
    /// The command payload was malformed or out of range.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// Invariant violation local to this one command.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable error kind sent on the wire, in acks and HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::RoomNotFound => "room_not_found",
            ServiceError::InvalidPin => "invalid_pin",
            ServiceError::InvalidToken => "invalid_token",
            ServiceError::NotAuthorised => "not_authorised",
            ServiceError::UnknownAction => "unknown_action",
            ServiceError::InvalidPayload(_) => "invalid_payload",
            ServiceError::Internal(_) => "unknown_error",
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidPayload(err.to_string())
    }
}

/// HTTP-facing wrapper mapping [`ServiceError`] onto status codes.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] pub ServiceError);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ServiceError::RoomNotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidPin
            | ServiceError::InvalidToken
            | ServiceError::NotAuthorised => StatusCode::FORBIDDEN,
            ServiceError::UnknownAction | ServiceError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            error: self.0.kind(),
        });

        (status, payload).into_response()
    }
}
