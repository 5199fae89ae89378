//! Wire protocol.
//!
//! This module owns **every message that crosses the socket** between the
//! server and a client. Every frame is a JSON envelope
//! `{ "type": <string>, "data": <payload> }`.
//!
//! | Direction | `type`        | Payload                              |
//! |-----------|---------------|--------------------------------------|
//! | S → C     | `map`         | [`MapPayload`]                       |
//! | S → C     | `players`     | session id → [`Player`]              |
//! | S → C     | `self`        | [`SelfInfo`]                         |
//! | C → S     | `newPlayer`   | [`NewPlayer`]                        |
//! | S → C     | `newPlayer`   | [`PlayerJoined`]                     |
//! | C → S     | `playerMoved` | [`PlayerMoved`]                      |
//! | S → C     | `playerMoved` | [`PlayerMovedRelay`]                 |
//! | both      | `tileUpdate`  | [`TileUpdate`]                       |
//! | S → C     | `spawnTrees`  | list of [`TileUpdate`]               |
//! | S → C     | `deletePlayer`| session id                           |
//! | S → C     | `info`        | text                                 |
//! | C → S     | `chatMessage` | [`ChatText`]                         |
//! | S → C     | `chatMessage` | [`ChatRelay`]                        |
//!
//! ## Design rules
//!
//! 1. Inbound messages decode into a closed enum; anything else is a
//!    [`ProtocolError`] and is dropped by the caller.
//! 2. Inbound structs list exactly the fields the server accepts. Extra
//!    fields a client sends are ignored, never copied into server state.
//! 3. Numbers are validated ([`ClientMessage::validate`]) before use.
//! 4. No presentation state (sprites, colours, animation frames) travels here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::grid::WorldGrid;
use crate::islands::IslandId;
use crate::objects::PlacedTile;
use crate::player::{Direction, Player, SessionId};
use crate::tiles::TileId;

/// Largest player box side accepted from a client, in tiles.
pub const MAX_BOX_TILES: f64 = 4.0;
/// Longest chat line relayed.
pub const MAX_CHAT_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPayload {
    pub cols: usize,
    pub rows: usize,
    pub tile_size: u32,
    pub display_size: u32,
    pub layers: Vec<Vec<TileId>>,
    pub islands: Vec<IslandId>,
    pub island_count: u32,
}

impl MapPayload {
    pub fn from_grid(grid: &WorldGrid) -> Self {
        Self {
            cols: grid.cols(),
            rows: grid.rows(),
            tile_size: grid.tile_size(),
            display_size: grid.display_size(),
            layers: grid.layers().to_vec(),
            islands: grid.islands().to_vec(),
            island_count: grid.island_count(),
        }
    }

    pub fn into_grid(self) -> Result<WorldGrid, ProtocolError> {
        Ok(WorldGrid::from_parts(
            self.cols,
            self.rows,
            self.tile_size,
            self.display_size,
            self.layers,
            self.islands,
            self.island_count,
        )?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfInfo {
    pub id: SessionId,
    pub name: String,
    pub pos: Position,
}

/// A client registering its player. Only geometry and facing are taken;
/// the server owns identity, name and progress sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub dir: Direction,
    #[serde(default)]
    pub moving: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    pub session_id: SessionId,
    pub player: Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMoved {
    pub x: f64,
    pub y: f64,
    pub dir: Direction,
    pub moving: bool,
    pub dir_offset: [i32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMovedRelay {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub moved: PlayerMoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUpdate {
    pub layer: usize,
    pub col: usize,
    pub row: usize,
    #[serde(rename = "type")]
    pub tile: TileId,
}

impl From<PlacedTile> for TileUpdate {
    fn from(p: PlacedTile) -> Self {
        Self {
            layer: p.layer,
            col: p.col,
            row: p.row,
            tile: p.tile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatText {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRelay {
    pub session_id: SessionId,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    NewPlayer(NewPlayer),
    PlayerMoved(PlayerMoved),
    TileUpdate(TileUpdate),
    ChatMessage(ChatText),
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Map(MapPayload),
    Players(BTreeMap<SessionId, Player>),
    #[serde(rename = "self")]
    SelfInfo(SelfInfo),
    NewPlayer(PlayerJoined),
    PlayerMoved(PlayerMovedRelay),
    TileUpdate(TileUpdate),
    SpawnTrees(Vec<TileUpdate>),
    DeletePlayer(SessionId),
    Info(String),
    ChatMessage(ChatRelay),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Map(_) => "map",
            ServerMessage::Players(_) => "players",
            ServerMessage::SelfInfo(_) => "self",
            ServerMessage::NewPlayer(_) => "newPlayer",
            ServerMessage::PlayerMoved(_) => "playerMoved",
            ServerMessage::TileUpdate(_) => "tileUpdate",
            ServerMessage::SpawnTrees(_) => "spawnTrees",
            ServerMessage::DeletePlayer(_) => "deletePlayer",
            ServerMessage::Info(_) => "info",
            ServerMessage::ChatMessage(_) => "chatMessage",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<ServerMessage, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        serde_json::from_str(text).map_err(|source| ProtocolError::InvalidPayload {
            kind: raw.kind,
            source,
        })
    }
}

/// Outer shape only; the payload is typed once `type` is known.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ClientMessage {
    pub const KINDS: [&'static str; 4] = ["newPlayer", "playerMoved", "tileUpdate", "chatMessage"];

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::NewPlayer(_) => "newPlayer",
            ClientMessage::PlayerMoved(_) => "playerMoved",
            ClientMessage::TileUpdate(_) => "tileUpdate",
            ClientMessage::ChatMessage(_) => "chatMessage",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate one inbound frame.
    pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
        let RawEnvelope { kind, data } =
            serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let invalid = |source| ProtocolError::InvalidPayload {
            kind: kind.clone(),
            source,
        };

        let msg = match kind.as_str() {
            "newPlayer" => ClientMessage::NewPlayer(serde_json::from_value(data).map_err(invalid)?),
            "playerMoved" => {
                ClientMessage::PlayerMoved(serde_json::from_value(data).map_err(invalid)?)
            }
            "tileUpdate" => ClientMessage::TileUpdate(serde_json::from_value(data).map_err(invalid)?),
            "chatMessage" => {
                ClientMessage::ChatMessage(serde_json::from_value(data).map_err(invalid)?)
            }
            _ => return Err(ProtocolError::UnknownType(kind.clone())),
        };

        msg.validate()?;
        Ok(msg)
    }

    /// Field-level checks that need no world state.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::NewPlayer(p) => {
                finite("x", p.x)?;
                finite("y", p.y)?;
                finite("width", p.width)?;
                finite("height", p.height)?;
                if p.width <= 0.0 || p.height <= 0.0 {
                    return Err(ProtocolError::field("width", "box must have positive size"));
                }
            }
            ClientMessage::PlayerMoved(m) => {
                finite("x", m.x)?;
                finite("y", m.y)?;
                if m.dir_offset.iter().any(|v| !(-1..=1).contains(v)) {
                    return Err(ProtocolError::field(
                        "dirOffset",
                        format!("components must be within -1..=1, got {:?}", m.dir_offset),
                    ));
                }
            }
            ClientMessage::TileUpdate(_) => {}
            ClientMessage::ChatMessage(c) => {
                let text = c.text.trim();
                if text.is_empty() {
                    return Err(ProtocolError::field("text", "empty message"));
                }
                if text.chars().count() > MAX_CHAT_LEN {
                    return Err(ProtocolError::field("text", "message too long"));
                }
            }
        }
        Ok(())
    }
}

fn finite(field: &'static str, v: f64) -> Result<(), ProtocolError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::field(field, "must be a finite number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::PixelBox;

    #[test]
    fn envelope_shape_matches_wire() {
        let msg = ServerMessage::DeletePlayer(4);
        assert_eq!(msg.encode().unwrap(), r#"{"type":"deletePlayer","data":4}"#);

        let msg = ServerMessage::Info("hi".into());
        assert_eq!(msg.encode().unwrap(), r#"{"type":"info","data":"hi"}"#);
    }

    #[test]
    fn self_variant_uses_reserved_word() {
        let msg = ServerMessage::SelfInfo(SelfInfo {
            id: 2,
            name: "Player2".into(),
            pos: Position { x: 1.0, y: 2.0 },
        });
        let text = msg.encode().unwrap();
        assert!(text.starts_with(r#"{"type":"self""#));
        assert_eq!(ServerMessage::decode(&text).unwrap(), msg);
    }

    #[test]
    fn relay_flattens_move_fields() {
        let relay = ServerMessage::PlayerMoved(PlayerMovedRelay {
            session_id: 3,
            moved: PlayerMoved {
                x: 10.0,
                y: 20.0,
                dir: Direction::Left,
                moving: true,
                dir_offset: [-1, 0],
            },
        });
        let value: serde_json::Value = serde_json::from_str(&relay.encode().unwrap()).unwrap();
        assert_eq!(value["data"]["sessionId"], 3);
        assert_eq!(value["data"]["dirOffset"], serde_json::json!([-1, 0]));
        assert_eq!(value["data"]["dir"], 1);
    }

    #[test]
    fn tile_update_uses_type_field() {
        let text = r#"{"type":"tileUpdate","data":{"layer":1,"col":2,"row":3,"type":15}}"#;
        assert_eq!(
            ClientMessage::decode(text).unwrap(),
            ClientMessage::TileUpdate(TileUpdate {
                layer: 1,
                col: 2,
                row: 3,
                tile: 15
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ClientMessage::decode(r#"{"type":"teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(k) if k == "teleport"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            ClientMessage::decode("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"data":1}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_payload_shape_is_rejected() {
        let err = ClientMessage::decode(r#"{"type":"playerMoved","data":{"x":"left"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { kind, .. } if kind == "playerMoved"));
    }

    #[test]
    fn extra_player_fields_are_not_imported() {
        let text = r#"{"type":"newPlayer","data":{"x":1,"y":2,"width":30,"height":40,
            "sessionId":99,"visitedIslands":[1,2,3],"sprite":"knight"}}"#;
        let ClientMessage::NewPlayer(p) = ClientMessage::decode(text).unwrap() else {
            panic!("expected newPlayer");
        };
        assert_eq!(p.width, 30.0);
        assert_eq!(p.dir, Direction::Down);
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        assert!(ClientMessage::decode(
            r#"{"type":"newPlayer","data":{"x":1,"y":2,"width":0,"height":40}}"#
        )
        .is_err());
        assert!(ClientMessage::decode(
            r#"{"type":"playerMoved","data":{"x":1,"y":2,"dir":0,"moving":true,"dirOffset":[0,-2]}}"#
        )
        .is_err());
        assert!(ClientMessage::decode(r#"{"type":"chatMessage","data":{"text":"   "}}"#).is_err());
    }

    #[test]
    fn players_map_roundtrip() {
        let mut roster = BTreeMap::new();
        roster.insert(5, Player::new(5, "Player5", PixelBox::new(1.0, 2.0, 30.0, 40.0)));
        let msg = ServerMessage::Players(roster);
        assert_eq!(ServerMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
    }
}
