use serde::{Deserialize, Serialize};

use super::stats::Stats;

/// Requests a client may send over the socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom,

    JoinRoom {
        code: String,
    },

    SubmitRating {
        code: String,
        value: f64,
    },

    ClearRatings {
        code: String,
    },

    EndRoom {
        code: String,
    },
}

/// Events the server pushes to room subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomUpdate {
        code: String,
        count: usize,
        avg: f64,
        distribution: [u32; 5],
    },

    RoomEnded {
        code: String,
    },
}

impl ServerMessage {
    pub fn room_update(code: &str, stats: &Stats) -> Self {
        ServerMessage::RoomUpdate {
            code: code.to_string(),
            count: stats.count,
            avg: stats.avg,
            distribution: stats.distribution,
        }
    }

    pub fn room_ended(code: &str) -> Self {
        ServerMessage::RoomEnded {
            code: code.to_string(),
        }
    }
}

/// Per-request acknowledgement, sent only to the originating connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            code: None,
            error: None,
        }
    }

    pub fn ok_with_code(code: &str) -> Self {
        Self {
            ok: true,
            code: Some(code.to_string()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_names() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"create_room"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"submit_rating","code":"ABQRST","value":4}"#).unwrap();
        match msg {
            ClientMessage::SubmitRating { code, value } => {
                assert_eq!(code, "ABQRST");
                assert_eq!(value, 4.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_rating_fails_to_parse() {
        let result = serde_json::from_str::<ClientMessage>(
            r#"{"type":"submit_rating","code":"ABQRST","value":"four"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_room_update_wire_shape() {
        let stats = Stats {
            count: 1,
            avg: 4.0,
            distribution: [0, 0, 0, 1, 0],
        };
        let json = serde_json::to_value(ServerMessage::room_update("ABQRST", &stats)).unwrap();

        assert_eq!(json["type"], "room_update");
        assert_eq!(json["code"], "ABQRST");
        assert_eq!(json["count"], 1);
        assert_eq!(json["avg"], 4.0);
        assert_eq!(json["distribution"], serde_json::json!([0, 0, 0, 1, 0]));
    }

    #[test]
    fn test_ack_omits_empty_fields() {
        let json = serde_json::to_string(&Ack::ok()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);

        let json = serde_json::to_value(Ack::err("Room not found")).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Room not found");
        assert!(json.get("code").is_none());
    }
}
