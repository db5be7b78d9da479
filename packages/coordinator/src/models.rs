use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared::config::{GameType, Region};
use shared::models::AssignedPlayer;

/// Sent to the surviving half of a duplicate-device pair.
pub const ERROR_CODE_DUPLICATE_DEVICE: u16 = 1000;
/// Sent when credential verification fails before the socket is closed.
pub const ERROR_CODE_UNAUTHORIZED: u16 = 3000;

/// Inbound frame envelope: `{ "event": "...", "data": ... }`. Payloads
/// are parsed per event so one malformed field fails only its own event.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub region: Region,
    pub game_type: GameType,
    #[serde(default)]
    pub party_members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadyUpRequest {
    pub key: String,
    /// Millisecond epoch timestamp of the client's acknowledgement.
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateSearchRequest {
    pub queue_session_id: String,
}

/// Connection details delivered with `gameReady` to both the players and
/// the hosting game server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReadyData {
    pub timestamp: String,
    pub connection_string: String,
    pub region: Region,
    pub game_type: GameType,
    pub game_id: String,
    pub players: Vec<AssignedPlayer>,
}

/// Outbound frames, serialized as `{ "event": "...", "data": ... }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    GameSessionSearchResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        queue_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GameSessionFound {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    GameReady {
        success: bool,
        data: GameReadyData,
    },
    JoinSession(String),
    LeaveSession(String),
    Error {
        code: u16,
        error: String,
    },
}
