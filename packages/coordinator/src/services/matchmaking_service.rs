use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use shared::config::{GameType, Region, TEAM_SIZE};
use shared::models::{AssignedPlayer, QueueSession, Team};
use shared::repositories::queue_repository::QueueRepository;

use crate::hub::ConnectionHub;
use crate::models::ServerEvent;
use crate::services::allocation_service::AllocationService;
use crate::services::errors::allocation_service_errors::AllocationServiceError;
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;
use crate::services::readyup_service::ReadyUpService;

/// Output of one assembly pass: the team-labelled players and the
/// deduplicated queue sessions they came from.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub game_type: GameType,
    pub region: Region,
    pub players: Vec<AssignedPlayer>,
    pub session_ids: Vec<String>,
}

/// Scans a pool, assembles two teams, and drives server allocation and
/// pending-match publication.
pub struct MatchmakingService {
    queue_repository: Arc<dyn QueueRepository>,
    allocation_service: Arc<AllocationService>,
    readyup_service: Arc<ReadyUpService>,
    hub: Arc<ConnectionHub>,
    pool_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MatchmakingService {
    pub fn new(
        queue_repository: Arc<dyn QueueRepository>,
        allocation_service: Arc<AllocationService>,
        readyup_service: Arc<ReadyUpService>,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        MatchmakingService {
            queue_repository,
            allocation_service,
            readyup_service,
            hub,
            pool_locks: Mutex::new(HashMap::new()),
        }
    }

    fn pool_lock(&self, pool: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.pool_locks
            .lock()
            .expect("pool lock registry poisoned")
            .entry(pool.to_string())
            .or_default()
            .clone()
    }

    /// Runs one assembly pass for the pool. Passes for the same pool are
    /// serialized so concurrent enqueues cannot count the same sessions
    /// into two match attempts.
    pub async fn run_matchmaking(
        &self,
        game_type: GameType,
        region: Region,
    ) -> Result<(), MatchmakingServiceError> {
        let pool = QueueSession::pool_key(game_type, region);
        let lock = self.pool_lock(&pool);
        let _guard = lock.lock().await;

        let sessions = self
            .queue_repository
            .list_pool(game_type, region)
            .await
            .map_err(|e| MatchmakingServiceError::RepositoryError(e.to_string()))?;

        let players_needed = game_type.players_required();
        let Some(candidate) = assemble_teams(game_type, region, &sessions, players_needed) else {
            let waiting: usize = sessions.iter().map(QueueSession::player_count).sum();
            info!(
                "Waiting for more players in pool {}: {}/{}",
                pool, waiting, players_needed
            );
            return Ok(());
        };

        info!(
            "Assembled {} players from {} sessions in pool {}, allocating game server",
            candidate.players.len(),
            candidate.session_ids.len(),
            pool
        );

        let server = match self.allocation_service.allocate(region).await {
            Ok(server) => server,
            Err(AllocationServiceError::NoServerAvailable) => {
                warn!("No game server available in region {}", region);
                let event = ServerEvent::GameSessionFound {
                    success: false,
                    key: None,
                    error: Some("There are no servers available.".to_string()),
                };
                // Sessions stay queued; they are retried on the next
                // enqueue trigger.
                for session_id in &candidate.session_ids {
                    self.hub
                        .emit(&format!("queueSession.{}", session_id), &event);
                }
                return Ok(());
            }
        };

        self.readyup_service
            .publish(candidate, &server)
            .await
            .map_err(|e| MatchmakingServiceError::PublishError(e.to_string()))?;

        Ok(())
    }
}

/// Walks the pool oldest-first, assigning players to Team A up to
/// TEAM_SIZE and then to Team B. A session's players may straddle the
/// team boundary; assignment is player-granular. Returns None while the
/// pool holds fewer assignable players than `players_needed`.
pub fn assemble_teams(
    game_type: GameType,
    region: Region,
    sessions: &[QueueSession],
    players_needed: usize,
) -> Option<MatchCandidate> {
    let mut players = Vec::new();
    let mut session_ids: Vec<String> = Vec::new();
    let mut team_a = 0usize;
    let mut team_b = 0usize;

    'sessions: for session in sessions {
        for account_id in session.player_ids() {
            let team = if team_a < TEAM_SIZE {
                team_a += 1;
                Team::A
            } else if team_b < TEAM_SIZE {
                team_b += 1;
                Team::B
            } else {
                break 'sessions;
            };

            players.push(AssignedPlayer {
                account_id: account_id.to_string(),
                team,
            });
            if !session_ids.contains(&session.id) {
                session_ids.push(session.id.clone());
            }
        }
    }

    if !players.is_empty() && players.len() >= players_needed {
        Some(MatchCandidate {
            game_type,
            region,
            players,
            session_ids,
        })
    } else {
        None
    }
}
