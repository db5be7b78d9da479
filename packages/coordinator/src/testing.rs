//! In-memory doubles shared by the service and hub test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use shared::config::{GameType, Region};
use shared::models::{Game, GameServer, PendingMatch, QueueSession};
use shared::repositories::errors::game_repository_errors::GameRepositoryError;
use shared::repositories::errors::game_server_repository_errors::GameServerRepositoryError;
use shared::repositories::errors::pending_match_repository_errors::PendingMatchRepositoryError;
use shared::repositories::errors::queue_repository_errors::QueueRepositoryError;
use shared::repositories::game_repository::GameRepository;
use shared::repositories::game_server_repository::GameServerRepository;
use shared::repositories::pending_match_repository::PendingMatchRepository;
use shared::repositories::queue_repository::QueueRepository;

use crate::hub::{ConnectionHub, ConnectionId, HubMessage};

pub(crate) fn test_connection(
    hub: &ConnectionHub,
) -> (ConnectionId, mpsc::UnboundedReceiver<HubMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (hub.register(tx), rx)
}

/// Pops the next queued frame and parses it, panicking on anything that
/// is not an event.
pub(crate) fn expect_event(rx: &mut mpsc::UnboundedReceiver<HubMessage>) -> serde_json::Value {
    match rx.try_recv() {
        Ok(HubMessage::Event(frame)) => serde_json::from_str(&frame).expect("unparseable frame"),
        other => panic!("expected an event frame, got {:?}", other),
    }
}

pub(crate) fn game_server(id: &str, region: Region) -> GameServer {
    GameServer {
        id: id.to_string(),
        region,
        connection_string: format!("{}.game.example:7777", id),
        in_use: false,
        ready: true,
    }
}

pub(crate) fn queue_session(
    account_id: &str,
    game_type: GameType,
    region: Region,
    party_members: &[&str],
) -> QueueSession {
    QueueSession::new(
        account_id,
        region,
        game_type,
        party_members.iter().map(|member| member.to_string()).collect(),
    )
}

pub(crate) struct MockQueueRepository {
    pub sessions: Mutex<Vec<QueueSession>>,
    pub fail: AtomicBool,
}

impl MockQueueRepository {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_sessions(sessions: Vec<QueueSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            fail: AtomicBool::new(false),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn check_fail(&self) -> Result<(), QueueRepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(QueueRepositoryError::DynamoDb("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueRepository for MockQueueRepository {
    async fn upsert_session(&self, session: &QueueSession) -> Result<(), QueueRepositoryError> {
        self.check_fail()?;
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|existing| existing.account_id != session.account_id);
        sessions.push(session.clone());
        Ok(())
    }

    async fn find_by_account_or_party(
        &self,
        account_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError> {
        self.check_fail()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|session| {
                session.account_id == account_id
                    || session.party_members.iter().any(|member| member == account_id)
            })
            .cloned())
    }

    async fn find_by_id(
        &self,
        session_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError> {
        self.check_fail()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|session| session.id == session_id)
            .cloned())
    }

    async fn delete_by_account(&self, account_id: &str) -> Result<(), QueueRepositoryError> {
        self.check_fail()?;
        self.sessions
            .lock()
            .unwrap()
            .retain(|session| session.account_id != account_id);
        Ok(())
    }

    async fn list_pool(
        &self,
        game_type: GameType,
        region: Region,
    ) -> Result<Vec<QueueSession>, QueueRepositoryError> {
        self.check_fail()?;
        let mut sessions: Vec<QueueSession> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|session| session.game_type == game_type && session.region == region)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.created_at);
        Ok(sessions)
    }

    async fn delete_by_ids(&self, session_ids: &[String]) -> Result<(), QueueRepositoryError> {
        self.check_fail()?;
        self.sessions
            .lock()
            .unwrap()
            .retain(|session| !session_ids.contains(&session.id));
        Ok(())
    }
}

pub(crate) struct MockGameServerRepository {
    pub servers: Mutex<HashMap<String, GameServer>>,
    pub fail_finds: AtomicBool,
}

impl MockGameServerRepository {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            fail_finds: AtomicBool::new(false),
        }
    }

    pub fn with_servers(servers: Vec<GameServer>) -> Self {
        Self {
            servers: Mutex::new(
                servers
                    .into_iter()
                    .map(|server| (server.id.clone(), server))
                    .collect(),
            ),
            fail_finds: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl GameServerRepository for MockGameServerRepository {
    async fn get_server(
        &self,
        server_id: &str,
    ) -> Result<Option<GameServer>, GameServerRepositoryError> {
        Ok(self.servers.lock().unwrap().get(server_id).cloned())
    }

    async fn find_available(
        &self,
        region: Region,
    ) -> Result<Vec<GameServer>, GameServerRepositoryError> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(GameServerRepositoryError::DynamoDb(
                "injected failure".to_string(),
            ));
        }
        let mut servers: Vec<GameServer> = self
            .servers
            .lock()
            .unwrap()
            .values()
            .filter(|server| server.region == region && !server.in_use && server.ready)
            .cloned()
            .collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(servers)
    }

    async fn try_claim(&self, server_id: &str) -> Result<bool, GameServerRepositoryError> {
        let mut servers = self.servers.lock().unwrap();
        match servers.get_mut(server_id) {
            Some(server) if !server.in_use => {
                server.in_use = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_ready(
        &self,
        server_id: &str,
        ready: bool,
    ) -> Result<(), GameServerRepositoryError> {
        if let Some(server) = self.servers.lock().unwrap().get_mut(server_id) {
            server.ready = ready;
        }
        Ok(())
    }
}

pub(crate) struct MockGameRepository {
    pub games: Mutex<Vec<Game>>,
}

impl MockGameRepository {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(Vec::new()),
        }
    }

    pub fn created_count(&self) -> usize {
        self.games.lock().unwrap().len()
    }
}

#[async_trait]
impl GameRepository for MockGameRepository {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError> {
        self.games.lock().unwrap().push(game.clone());
        Ok(())
    }
}

pub(crate) struct MockPendingMatchRepository {
    pub pending: Mutex<HashMap<String, PendingMatch>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl MockPendingMatchRepository {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn ack_count(&self, key: &str) -> i64 {
        self.counters.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PendingMatchRepository for MockPendingMatchRepository {
    async fn put_pending(
        &self,
        key: &str,
        pending: &PendingMatch,
    ) -> Result<(), PendingMatchRepositoryError> {
        self.pending
            .lock()
            .unwrap()
            .insert(key.to_string(), pending.clone());
        self.counters.lock().unwrap().insert(key.to_string(), 0);
        Ok(())
    }

    async fn get_pending(
        &self,
        key: &str,
    ) -> Result<Option<PendingMatch>, PendingMatchRepositoryError> {
        Ok(self.pending.lock().unwrap().get(key).cloned())
    }

    async fn incr_ack_count(&self, key: &str) -> Result<i64, PendingMatchRepositoryError> {
        let mut counters = self.counters.lock().unwrap();
        let count = counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
