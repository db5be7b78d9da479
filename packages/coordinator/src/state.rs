use std::sync::Arc;

use shared::auth::Authenticator;
use shared::repositories::game_server_repository::GameServerRepository;

use crate::hub::ConnectionHub;
use crate::services::{MatchmakingService, QueueService, ReadyUpService};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub authenticator: Arc<Authenticator>,
    pub queue_service: Arc<QueueService>,
    pub matchmaking_service: Arc<MatchmakingService>,
    pub readyup_service: Arc<ReadyUpService>,
    pub server_repository: Arc<dyn GameServerRepository>,
}
