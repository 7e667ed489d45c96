//! Control messages exchanged over a realtime connection
//!
//! Client → server: `{"type": "join:team", "teamId": "..."}`,
//! `{"type": "leave:team", "teamId": "..."}`, `{"type": "ping"}`.
//!
//! Server → client replies use the same `type` tag; team events are sent
//! separately in the `{"event", "data"}` shape of [`super::events::TeamEvent`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe to a team group (membership is re-checked)
    #[serde(rename = "join:team", rename_all = "camelCase")]
    JoinTeam { team_id: Uuid },

    /// Unsubscribe from a team group
    #[serde(rename = "leave:team", rename_all = "camelCase")]
    LeaveTeam { team_id: Uuid },

    #[serde(rename = "ping")]
    Ping,
}

/// Reply sent to a single connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once after the handshake with the groups joined automatically
    #[serde(rename_all = "camelCase")]
    Connected { user_id: Uuid, team_ids: Vec<Uuid> },

    #[serde(rename_all = "camelCase")]
    Joined { team_id: Uuid },

    #[serde(rename_all = "camelCase")]
    Left { team_id: Uuid },

    Pong,

    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let team_id = Uuid::new_v4();

        let join: ClientMessage =
            serde_json::from_value(json!({"type": "join:team", "teamId": team_id})).unwrap();
        assert_eq!(join, ClientMessage::JoinTeam { team_id });

        let leave: ClientMessage =
            serde_json::from_value(json!({"type": "leave:team", "teamId": team_id})).unwrap();
        assert_eq!(leave, ClientMessage::LeaveTeam { team_id });

        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"join:team"}"#).is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        let team_id = Uuid::nil();
        assert_eq!(
            serde_json::to_value(ServerMessage::Joined { team_id }).unwrap(),
            json!({"type": "joined", "teamId": team_id})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).unwrap(),
            json!({"type": "pong"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("nope")).unwrap(),
            json!({"type": "error", "message": "nope"})
        );
    }
}
