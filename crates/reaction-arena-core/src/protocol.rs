//! Wire protocol.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use crate::leaderboard::Leaderboard;
use crate::types::Position;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    RegisterUser(RegisterUserContent),
    VirusClicked(VirusClickedContent),
    SaveData(SaveDataContent),
}

const CLIENT_EVENTS: &[&str] = &["registerUser", "virusClicked", "saveData"];

/// Same shape as the derived form, except a missing or null `data` reads as `{}`.
/// Clients emit `saveData` without a payload.
impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Frame {
            event: String,
            #[serde(default)]
            data: Option<Value>,
        }

        let frame = Frame::deserialize(deserializer)?;
        let data = frame.data.unwrap_or_else(|| Value::Object(Default::default()));
        let event = match frame.event.as_str() {
            "registerUser" => serde_json::from_value(data).map(ClientEvent::RegisterUser),
            "virusClicked" => serde_json::from_value(data).map(ClientEvent::VirusClicked),
            "saveData" => serde_json::from_value(data).map(ClientEvent::SaveData),
            other => return Err(de::Error::unknown_variant(other, CLIENT_EVENTS)),
        };
        event.map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterUserContent {
    pub username: String,
}

/// A round completion: a click, or the client's timeout reported as a miss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusClickedContent {
    /// Seconds from stimulus to click
    pub reaction_time: f64,
    /// Round index as the client sees it
    #[serde(default)]
    pub iteration: Option<usize>,
    /// Informational; the registered identity wins
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveDataContent {}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    UserId(String),
    WaitingLobby,
    GameStarting(GameStartingContent),
    VirusPosition(Position),
    OnGameInformationUpdated(GameInformation),
    ShowHighestScores(Leaderboard),
    OpponentLeft,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartingContent {
    pub opponent_name: String,
}

/// Paired score update, sent once both players have an entry for a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInformation {
    pub opp_time: f64,
    pub opp_total_time: f64,
    pub my_time: f64,
    pub my_total_time: f64,
    /// Rounds the opponent has completed, so a lagging client can catch up its counter
    #[serde(rename = "opponentIteration", skip_serializing_if = "Option::is_none", default)]
    pub opponent_iteration: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_parsing() {
        let register: ClientEvent =
            serde_json::from_value(json!({"event": "registerUser", "data": {"username": "alice"}})).unwrap();
        assert_eq!(
            register,
            ClientEvent::RegisterUser(RegisterUserContent {
                username: "alice".to_string()
            })
        );

        let click: ClientEvent = serde_json::from_value(json!({
            "event": "virusClicked",
            "data": {"reactionTime": 0.45, "iteration": 0, "userId": "u1"}
        }))
        .unwrap();
        let ClientEvent::VirusClicked(click) = click else {
            panic!("expected virusClicked");
        };
        assert_eq!(click.reaction_time, 0.45);
        assert_eq!(click.iteration, Some(0));
        assert_eq!(click.user_id.as_deref(), Some("u1"));

        let bare: ClientEvent =
            serde_json::from_value(json!({"event": "virusClicked", "data": {"reactionTime": 30}})).unwrap();
        assert!(matches!(bare, ClientEvent::VirusClicked(VirusClickedContent { iteration: None, .. })));

        let save: ClientEvent = serde_json::from_value(json!({"event": "saveData", "data": {}})).unwrap();
        assert_eq!(save, ClientEvent::SaveData(SaveDataContent {}));
    }

    #[test]
    fn test_missing_data_reads_as_empty() {
        let save: ClientEvent = serde_json::from_str(r#"{"event":"saveData"}"#).unwrap();
        assert_eq!(save, ClientEvent::SaveData(SaveDataContent {}));

        let save: ClientEvent = serde_json::from_str(r#"{"event":"saveData","data":null}"#).unwrap();
        assert_eq!(save, ClientEvent::SaveData(SaveDataContent {}));

        // events with required fields still need them
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"registerUser"}"#).is_err());
    }

    #[test]
    fn test_client_event_round_trips_through_serialize() {
        let event = ClientEvent::RegisterUser(RegisterUserContent {
            username: "alice".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"event": "registerUser", "data": {"username": "alice"}}));
        assert_eq!(serde_json::from_value::<ClientEvent>(json).unwrap(), event);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"event": "requestNewVirusPosition"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_server_event_serialization() {
        let json = serde_json::to_value(ServerEvent::UserId("u1".to_string())).unwrap();
        assert_eq!(json, json!({"event": "userId", "data": "u1"}));

        let json = serde_json::to_value(ServerEvent::WaitingLobby).unwrap();
        assert_eq!(json["event"], "waitingLobby");

        let json = serde_json::to_value(ServerEvent::GameStarting(GameStartingContent {
            opponent_name: "bob".to_string(),
        }))
        .unwrap();
        assert_eq!(json, json!({"event": "gameStarting", "data": {"opponentName": "bob"}}));

        let json = serde_json::to_value(ServerEvent::VirusPosition(Position { x: 10, y: 20 })).unwrap();
        assert_eq!(json, json!({"event": "virusPosition", "data": {"x": 10, "y": 20}}));

        let json = serde_json::to_value(ServerEvent::OnGameInformationUpdated(GameInformation {
            opp_time: 0.6,
            opp_total_time: 0.6,
            my_time: 0.45,
            my_total_time: 0.45,
            opponent_iteration: Some(1),
        }))
        .unwrap();
        assert_eq!(json["event"], "onGameInformationUpdated");
        assert_eq!(json["data"]["opp_time"], 0.6);
        assert_eq!(json["data"]["my_time"], 0.45);
        assert_eq!(json["data"]["opponentIteration"], 1);

        let json = serde_json::to_value(ServerEvent::Error("boom".to_string())).unwrap();
        assert_eq!(json, json!({"event": "error", "data": "boom"}));
    }
}
