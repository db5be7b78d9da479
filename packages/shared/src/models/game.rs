use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameType;

/// Durable record of a committed match, created only once ready-up quorum
/// is reached. Rosters are immutable; the `ongoing` flag lifecycle is
/// owned by gameplay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub game_type: GameType,
    pub server_id: String,
    pub team_a: Vec<String>,
    pub team_b: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub ongoing: bool,
}

impl Game {
    pub fn new(
        game_type: GameType,
        server_id: &str,
        team_a: Vec<String>,
        team_b: Vec<String>,
    ) -> Self {
        Game {
            id: Uuid::new_v4().to_string(),
            game_type,
            server_id: server_id.to_string(),
            team_a,
            team_b,
            created_at: Utc::now(),
            ongoing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_creation() {
        let game = Game::new(
            GameType::Custom,
            "srv-1",
            vec!["acc-1".to_string()],
            vec![],
        );

        assert!(!game.id.is_empty());
        assert_eq!(game.server_id, "srv-1");
        assert_eq!(game.team_a, vec!["acc-1"]);
        assert!(game.team_b.is_empty());
        assert!(game.ongoing);
    }
}
