use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tracing::info;

use coordinator::handlers::{coordinator_ws, health_check};
use coordinator::hub::ConnectionHub;
use coordinator::services::{
    AllocationService, MatchmakingService, QueueService, ReadyUpService,
};
use coordinator::state::AppState;
use shared::auth::Authenticator;
use shared::repositories::game_repository::{DynamoDbGameRepository, GameRepository};
use shared::repositories::game_server_repository::{
    DynamoDbGameServerRepository, GameServerRepository,
};
use shared::repositories::pending_match_repository::{
    PendingMatchRepository, RedisPendingMatchRepository,
};
use shared::repositories::queue_repository::{DynamoDbQueueRepository, QueueRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    info!("Coordinator starting");

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dynamodb = aws_sdk_dynamodb::Client::new(&config);

    let redis_url =
        std::env::var("REDIS_URL").expect("REDIS_URL environment variable must be set");
    let redis_client = redis::Client::open(redis_url)?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;

    let queue_repository: Arc<dyn QueueRepository> =
        Arc::new(DynamoDbQueueRepository::new(dynamodb.clone()));
    let server_repository: Arc<dyn GameServerRepository> =
        Arc::new(DynamoDbGameServerRepository::new(dynamodb.clone()));
    let game_repository: Arc<dyn GameRepository> =
        Arc::new(DynamoDbGameRepository::new(dynamodb));
    let pending_repository: Arc<dyn PendingMatchRepository> =
        Arc::new(RedisPendingMatchRepository::new(redis_conn));

    let hub = Arc::new(ConnectionHub::new());
    let authenticator = Arc::new(Authenticator::new(server_repository.clone()));
    let queue_service = Arc::new(QueueService::new(queue_repository.clone()));
    let allocation_service = Arc::new(AllocationService::new(server_repository.clone()));
    let readyup_service = Arc::new(ReadyUpService::new(
        pending_repository,
        game_repository,
        queue_repository.clone(),
        hub.clone(),
    ));
    let matchmaking_service = Arc::new(MatchmakingService::new(
        queue_repository,
        allocation_service,
        readyup_service.clone(),
        hub.clone(),
    ));

    let app_state = AppState {
        hub,
        authenticator,
        queue_service,
        matchmaking_service,
        readyup_service,
        server_repository,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/coordinator", get(coordinator_ws))
        .with_state(app_state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Coordinator listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
