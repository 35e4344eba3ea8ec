//! Wire envelope exchanged with client and game sessions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::Game;

/// `{"action": ..., "payload": ...}` in both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Outbound message carrying a game definition.
    pub fn with_game(action: Action, game: &Game) -> Result<Self, serde_json::Error> {
        Ok(Self {
            action: action.as_str().to_string(),
            payload: serde_json::to_value(game)?,
        })
    }

    pub fn known_action(&self) -> Option<Action> {
        Action::parse(&self.action)
    }
}

/// The recognised action vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// client -> server: begin playing; server -> game: this game should start
    Start,
    /// client -> server
    Reset,
    /// game -> server, server -> client
    Started,
    Completed,
    Failed,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Reset => "reset",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "reset" => Some(Self::Reset),
            "started" => Some(Self::Started),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_without_payload() {
        let msg = Message::decode(r#"{"action":"start"}"#).unwrap();
        assert_eq!(msg.known_action(), Some(Action::Start));
        assert!(msg.payload.is_null());
    }

    #[test]
    fn unknown_action_decodes() {
        let msg = Message::decode(r#"{"action":"dance","payload":{}}"#).unwrap();
        assert_eq!(msg.known_action(), None);
        assert_eq!(msg.action, "dance");
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(Message::decode("{not json").is_err());
        assert!(Message::decode(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn game_payload_on_wire() {
        let game = Game::named("ludo");
        let json = Message::with_game(Action::Start, &game)
            .unwrap()
            .encode()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "start");
        assert_eq!(value["payload"]["name"], "ludo");
    }

    #[test]
    fn action_strings() {
        for action in [
            Action::Start,
            Action::Reset,
            Action::Started,
            Action::Completed,
            Action::Failed,
        ] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
    }
}
