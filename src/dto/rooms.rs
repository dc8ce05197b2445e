use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::RoomAccess;

/// Body of the access and token-refresh requests.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    /// Admin PIN issued when the room was created.
    pub admin_pin: String,
}

/// One referee's join credential, rendered as a QR code by the admin UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinToken {
    /// Opaque per-position token; not intended for manual entry.
    pub token: String,
}

/// Join credentials for all three referee positions.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinQrCodes {
    /// Left referee credential.
    pub left: JoinToken,
    /// Center referee credential.
    pub center: JoinToken,
    /// Right referee credential.
    pub right: JoinToken,
}

/// Full credential bundle returned by every provisioning endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomAccessResponse {
    /// Short human-typeable room code.
    pub room_id: String,
    /// PIN authorizing the admin and display roles.
    pub admin_pin: String,
    /// Referee join credentials, one per position.
    #[serde(rename = "joinQRCodes")]
    pub join_qr_codes: JoinQrCodes,
}

impl From<RoomAccess> for RoomAccessResponse {
    fn from(access: RoomAccess) -> Self {
        Self {
            room_id: access.room_id,
            admin_pin: access.admin_pin,
            join_qr_codes: JoinQrCodes {
                left: JoinToken {
                    token: access.referee_tokens.left,
                },
                center: JoinToken {
                    token: access.referee_tokens.center,
                },
                right: JoinToken {
                    token: access.referee_tokens.right,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JudgeMap;

    #[test]
    fn response_serializes_the_qr_code_wire_shape() {
        let response = RoomAccessResponse::from(RoomAccess {
            room_id: "ABCD".into(),
            admin_pin: "1234".into(),
            referee_tokens: JudgeMap {
                left: "ltok".into(),
                center: "ctok".into(),
                right: "rtok".into(),
            },
        });
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["roomId"], "ABCD");
        assert_eq!(value["adminPin"], "1234");
        assert_eq!(value["joinQRCodes"]["center"]["token"], "ctok");
    }
}
