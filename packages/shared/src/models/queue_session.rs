use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{GameType, Region};

/// One unit of players (solo or a party) waiting for a match.
///
/// Stored keyed by `account_id`, so enqueueing an already-queued account
/// replaces its entry in one write. Party members ride on this session and
/// never get rows of their own. The `pool` attribute ("CUSTOM#LOCAL")
/// partitions the pool index used by assembly scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSession {
    pub account_id: String,
    pub id: String,
    pub pool: String,
    pub region: Region,
    pub game_type: GameType,
    pub created_at: DateTime<Utc>,
    pub party_members: Vec<String>,
}

impl QueueSession {
    pub fn new(
        account_id: &str,
        region: Region,
        game_type: GameType,
        party_members: Vec<String>,
    ) -> Self {
        QueueSession {
            account_id: account_id.to_string(),
            id: Uuid::new_v4().to_string(),
            pool: Self::pool_key(game_type, region),
            region,
            game_type,
            created_at: Utc::now(),
            party_members,
        }
    }

    pub fn pool_key(game_type: GameType, region: Region) -> String {
        format!("{}#{}", game_type, region)
    }

    /// Players this session contributes to a match: the owner plus any
    /// party members.
    pub fn player_count(&self) -> usize {
        1 + self.party_members.len()
    }

    pub fn player_ids(&self) -> Vec<&str> {
        let mut ids = Vec::with_capacity(self.player_count());
        ids.push(self.account_id.as_str());
        ids.extend(self.party_members.iter().map(String::as_str));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_key_format() {
        let session = QueueSession::new("acc-1", Region::Local, GameType::Custom, vec![]);
        assert_eq!(session.pool, "CUSTOM#LOCAL");
        assert_eq!(
            QueueSession::pool_key(GameType::Ranked, Region::Au),
            "RANKED#AU"
        );
    }

    #[test]
    fn test_player_count_includes_party() {
        let solo = QueueSession::new("acc-1", Region::Local, GameType::Custom, vec![]);
        assert_eq!(solo.player_count(), 1);

        let party = QueueSession::new(
            "acc-1",
            Region::Local,
            GameType::Custom,
            vec!["acc-2".to_string(), "acc-3".to_string()],
        );
        assert_eq!(party.player_count(), 3);
        assert_eq!(party.player_ids(), vec!["acc-1", "acc-2", "acc-3"]);
    }

    #[test]
    fn test_session_id_uniqueness() {
        let a = QueueSession::new("acc-1", Region::Local, GameType::Custom, vec![]);
        let b = QueueSession::new("acc-1", Region::Local, GameType::Custom, vec![]);
        assert_ne!(a.id, b.id);
    }
}
