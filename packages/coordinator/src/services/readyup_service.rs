use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, info};

use shared::models::{Game, GameServer, PendingMatch, Team};
use shared::repositories::game_repository::GameRepository;
use shared::repositories::pending_match_repository::PendingMatchRepository;
use shared::repositories::queue_repository::QueueRepository;

use crate::hub::ConnectionHub;
use crate::models::{GameReadyData, ServerEvent};
use crate::services::errors::readyup_service_errors::ReadyUpServiceError;
use crate::services::matchmaking_service::MatchCandidate;

/// Acknowledgements older than this relative to the coordinator clock are
/// dropped, independent of the ephemeral store's own TTLs.
pub const READY_UP_WINDOW_MS: i64 = 30_000;

/// Drives the ready-up quorum: publishes pending matches, collects
/// acknowledgements, and commits the match exactly once when enough
/// players confirm in time.
pub struct ReadyUpService {
    pending_repository: Arc<dyn PendingMatchRepository>,
    game_repository: Arc<dyn GameRepository>,
    queue_repository: Arc<dyn QueueRepository>,
    hub: Arc<ConnectionHub>,
}

impl ReadyUpService {
    pub fn new(
        pending_repository: Arc<dyn PendingMatchRepository>,
        game_repository: Arc<dyn GameRepository>,
        queue_repository: Arc<dyn QueueRepository>,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        ReadyUpService {
            pending_repository,
            game_repository,
            queue_repository,
            hub,
        }
    }

    /// Publishes a pending match for the candidate on the claimed server
    /// and hands every contributing queue session the ready-up key.
    pub async fn publish(
        &self,
        candidate: MatchCandidate,
        server: &GameServer,
    ) -> Result<String, ReadyUpServiceError> {
        let key = format!("gameFound.{}.{}", server.id, generate_key(6));

        let pending = PendingMatch {
            game_type: candidate.game_type,
            region: candidate.region,
            players_needed: candidate.game_type.players_required(),
            players: candidate.players,
            server_connection_string: server.connection_string.clone(),
            server_id: server.id.clone(),
            session_ids: candidate.session_ids,
            created_at: Utc::now(),
        };

        self.pending_repository
            .put_pending(&key, &pending)
            .await
            .map_err(|e| ReadyUpServiceError::RepositoryError(e.to_string()))?;

        info!(
            "Pending match {} published, waiting for {} ready-ups",
            key, pending.players_needed
        );

        let event = ServerEvent::GameSessionFound {
            success: true,
            key: Some(key.clone()),
            error: None,
        };
        for session_id in &pending.session_ids {
            self.hub
                .emit(&format!("queueSession.{}", session_id), &event);
        }

        Ok(key)
    }

    /// Records one ready-up acknowledgement. A missing pending match
    /// means the key already committed or expired; both are no-ops. The
    /// commit fires when the counter lands exactly on the required player
    /// count, so surplus or concurrent acknowledgements cannot commit
    /// twice.
    pub async fn acknowledge(
        &self,
        key: &str,
        timestamp_ms: i64,
        account_id: &str,
    ) -> Result<(), ReadyUpServiceError> {
        let pending = self
            .pending_repository
            .get_pending(key)
            .await
            .map_err(|e| ReadyUpServiceError::RepositoryError(e.to_string()))?;

        let Some(pending) = pending else {
            debug!("Ready-up for {} ignored: pending match absent", key);
            return Ok(());
        };

        let now_ms = Utc::now().timestamp_millis();
        if timestamp_ms <= now_ms - READY_UP_WINDOW_MS {
            debug!(
                "Stale ready-up from account {} for {} dropped",
                account_id, key
            );
            return Ok(());
        }

        let count = self
            .pending_repository
            .incr_ack_count(key)
            .await
            .map_err(|e| ReadyUpServiceError::RepositoryError(e.to_string()))?;

        info!(
            "({}/{}) Account {} readied up for {}",
            count, pending.players_needed, account_id, key
        );

        if count == pending.players_needed as i64 {
            self.commit(key, pending).await?;
        }

        Ok(())
    }

    async fn commit(&self, key: &str, pending: PendingMatch) -> Result<(), ReadyUpServiceError> {
        let game = Game::new(
            pending.game_type,
            &pending.server_id,
            pending.team_roster(Team::A),
            pending.team_roster(Team::B),
        );

        self.game_repository.create_game(&game).await.map_err(|e| {
            error!("Failed to create game for pending match {}: {}", key, e);
            ReadyUpServiceError::RepositoryError(e.to_string())
        })?;

        info!("Game {} confirmed and created", game.id);

        // Everyone waiting in the contributing sessions now follows the
        // game instead.
        let game_topic = format!("game.{}", game.id);
        for session_id in &pending.session_ids {
            self.hub
                .move_members(&format!("queueSession.{}", session_id), &game_topic);
        }

        if let Err(e) = self
            .queue_repository
            .delete_by_ids(&pending.session_ids)
            .await
        {
            error!(
                "Failed to delete queue sessions for game {}: {}",
                game.id, e
            );
        }

        let data = GameReadyData {
            timestamp: game.created_at.timestamp_millis().to_string(),
            connection_string: pending.server_connection_string.clone(),
            region: pending.region,
            game_type: pending.game_type,
            game_id: game.id.clone(),
            players: pending.players.clone(),
        };
        let event = ServerEvent::GameReady {
            success: true,
            data,
        };

        self.hub
            .emit(&format!("server.{}", pending.server_id), &event);
        self.hub.emit(&game_topic, &event);

        Ok(())
    }
}

fn generate_key(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}
