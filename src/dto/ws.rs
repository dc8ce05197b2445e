use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::session::{Card, Judge, StateSnapshot, Vote};

/// Role a client asks for when registering a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegisterRole {
    /// Meet administrator console; requires the admin PIN.
    Admin,
    /// Public display; requires the admin PIN.
    Display,
    /// Left referee console; requires the left token.
    Left,
    /// Center referee console; requires the center token.
    Center,
    /// Right referee console; requires the right token.
    Right,
    /// Read-only observer; no credential.
    Viewer,
}

impl RegisterRole {
    /// The referee position this role maps to, if any.
    pub fn judge(self) -> Option<Judge> {
        match self {
            RegisterRole::Left => Some(Judge::Left),
            RegisterRole::Center => Some(Judge::Center),
            RegisterRole::Right => Some(Judge::Right),
            _ => None,
        }
    }
}

/// Payload of `client:register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    /// Requested role.
    pub role: RegisterRole,
    /// Room the connection wants to bind to.
    pub room_id: String,
    /// Admin PIN; required for `admin` and `display`.
    pub pin: Option<String>,
    /// Referee token; required for referee roles.
    pub token: Option<String>,
}

/// Actions accepted by `timer:command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    /// Start the countdown.
    Start,
    /// Pause the countdown.
    Stop,
    /// Stop and restore the default duration.
    Reset,
    /// Set the remaining duration (and start).
    Set,
    /// Anything this endpoint does not know.
    #[serde(other)]
    Unknown,
}

/// Payload of `timer:command`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TimerCommandPayload {
    /// Requested action.
    pub action: TimerAction,
    /// Duration for `set`, in seconds.
    #[validate(range(min = 0.0, max = 86_400.0))]
    pub seconds: Option<f64>,
}

/// Actions accepted by `interval:command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IntervalAction {
    /// Start the countdown.
    Start,
    /// Pause the countdown.
    Stop,
    /// Stop and restore the configured duration.
    Reset,
    /// Configure the countdown duration.
    Set,
    /// Force the countdown visible.
    Show,
    /// Force the countdown hidden.
    Hide,
    /// Anything this endpoint does not know.
    #[serde(other)]
    Unknown,
}

/// Payload of `interval:command`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IntervalCommandPayload {
    /// Requested action.
    pub action: IntervalAction,
    /// Duration for `set`, in seconds.
    #[validate(range(min = 0.0, max = 86_400.0))]
    pub seconds: Option<f64>,
}

/// Messages accepted from connected clients, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Bind this connection to a room with a role and credential.
    #[serde(rename = "client:register")]
    Register(RegisterPayload),
    /// Cast or change the bound referee's vote.
    #[serde(rename = "ref:vote")]
    RefVote {
        /// The verdict.
        vote: Vote,
    },
    /// Toggle a penalty card (`null` clears the set).
    #[serde(rename = "ref:card")]
    RefCard {
        /// Card to toggle, or `null`.
        card: Option<Card>,
    },
    /// Reset the room for the next attempt.
    #[serde(rename = "admin:ready")]
    AdminReady,
    /// Force-reveal the decision.
    #[serde(rename = "admin:release")]
    AdminRelease,
    /// Clear the decision.
    #[serde(rename = "admin:clear")]
    AdminClear,
    /// Control the main lift timer.
    #[serde(rename = "timer:command")]
    TimerCommand(TimerCommandPayload),
    /// Control the interval countdown.
    #[serde(rename = "interval:command")]
    IntervalCommand(IntervalCommandPayload),
    /// Anything this gateway does not know.
    #[serde(other)]
    Unknown,
}

/// Per-command acknowledgement: `{"ok":true}` or `{"error":<kind>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AckResponse {
    /// The command was applied.
    Ok {
        /// Always `true`.
        ok: bool,
    },
    /// The command was rejected; no state was mutated.
    Error {
        /// Wire error kind, one of the shared vocabulary.
        error: String,
    },
}

impl AckResponse {
    /// Positive acknowledgement.
    pub fn ok() -> Self {
        AckResponse::Ok { ok: true }
    }

    /// Negative acknowledgement carrying a wire error kind.
    pub fn error(kind: impl Into<String>) -> Self {
        AckResponse::Error { error: kind.into() }
    }
}

/// Messages pushed to connected clients, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledgement of the most recent command.
    #[serde(rename = "ack")]
    Ack {
        /// The acknowledgement body, flattened into the message.
        #[serde(flatten)]
        ack: AckResponse,
    },
    /// Full room snapshot, sent on registration and after every mutation.
    #[serde(rename = "state:update")]
    StateUpdate {
        /// The fresh snapshot.
        state: StateSnapshot,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_message_parses() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"type":"client:register","role":"left","roomId":"ABCD","token":"tok"}"#,
        )
        .unwrap();
        let ClientMessage::Register(payload) = message else {
            panic!("expected register message");
        };
        assert_eq!(payload.role, RegisterRole::Left);
        assert_eq!(payload.role.judge(), Some(Judge::Left));
        assert_eq!(payload.room_id, "ABCD");
        assert_eq!(payload.token.as_deref(), Some("tok"));
        assert_eq!(payload.pin, None);
    }

    #[test]
    fn card_null_clears() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"ref:card","card":null}"#).unwrap();
        assert!(matches!(message, ClientMessage::RefCard { card: None }));

        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"ref:card","card":2}"#).unwrap();
        assert!(matches!(
            message,
            ClientMessage::RefCard {
                card: Some(Card::Blue)
            }
        ));
    }

    #[test]
    fn unknown_message_type_and_action_are_tolerated() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"admin:shred-everything"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));

        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"timer:command","action":"explode"}"#).unwrap();
        let ClientMessage::TimerCommand(payload) = message else {
            panic!("expected timer command");
        };
        assert_eq!(payload.action, TimerAction::Unknown);
    }

    #[test]
    fn out_of_range_seconds_fail_validation() {
        let payload = TimerCommandPayload {
            action: TimerAction::Set,
            seconds: Some(-5.0),
        };
        assert!(validator::Validate::validate(&payload).is_err());

        let payload = IntervalCommandPayload {
            action: IntervalAction::Set,
            seconds: Some(120.0),
        };
        assert!(validator::Validate::validate(&payload).is_ok());
    }

    #[test]
    fn acks_serialize_to_the_socket_shapes() {
        let ok = serde_json::to_value(ServerMessage::Ack {
            ack: AckResponse::ok(),
        })
        .unwrap();
        assert_eq!(ok["type"], "ack");
        assert_eq!(ok["ok"], true);

        let err = serde_json::to_value(ServerMessage::Ack {
            ack: AckResponse::error("invalid_token"),
        })
        .unwrap();
        assert_eq!(err["error"], "invalid_token");
    }
}
