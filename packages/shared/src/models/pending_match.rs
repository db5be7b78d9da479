use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{GameType, Region};

/// Team label assigned to a player during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedPlayer {
    pub account_id: String,
    pub team: Team,
}

/// A proposed, not-yet-committed match awaiting ready-up quorum.
///
/// Lives in the ephemeral store under an opaque key with a short TTL; a
/// paired counter (same key suffixed ".count") tracks acknowledgements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMatch {
    pub game_type: GameType,
    pub region: Region,
    pub players: Vec<AssignedPlayer>,
    pub players_needed: usize,
    pub server_connection_string: String,
    pub server_id: String,
    pub session_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingMatch {
    pub fn team_roster(&self, team: Team) -> Vec<String> {
        self.players
            .iter()
            .filter(|player| player.team == team)
            .map(|player| player.account_id.clone())
            .collect()
    }
}
