use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum players per team. Assembly fills Team A, then Team B, up to
/// this cap.
pub const TEAM_SIZE: usize = 5;

/// Matchmaking regions a session or game server can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    Local,
    Au,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Region::Local => write!(f, "LOCAL"),
            Region::Au => write!(f, "AU"),
        }
    }
}

/// Game modes players can queue for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    None,
    Custom,
    Ranked,
}

impl GameType {
    /// Minimum assembled players before a match proceeds to allocation.
    ///
    /// These thresholds are tuning values, intentionally far below the
    /// 2 * TEAM_SIZE capacity so small games can start during low
    /// population.
    pub fn players_required(self) -> usize {
        match self {
            GameType::None => 0,
            GameType::Custom => 1,
            GameType::Ranked => 1,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameType::None => write!(f, "NONE"),
            GameType::Custom => write!(f, "CUSTOM"),
            GameType::Ranked => write!(f, "RANKED"),
        }
    }
}
