use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use shared::config::Region;
use shared::models::GameServer;
use shared::repositories::game_server_repository::GameServerRepository;

use crate::services::errors::allocation_service_errors::AllocationServiceError;

/// Rounds of looking for an idle server before giving up.
const ALLOCATION_ATTEMPTS: u32 = 3;
/// Pause between rounds. Server availability is externally managed, so
/// this is a coarse poll rather than an event-driven wait.
const ALLOCATION_BACKOFF: Duration = Duration::from_secs(10);

/// Finds and claims an idle game server for a region.
#[derive(Clone)]
pub struct AllocationService {
    repository: Arc<dyn GameServerRepository>,
    attempts: u32,
    backoff: Duration,
}

impl AllocationService {
    pub fn new(repository: Arc<dyn GameServerRepository>) -> Self {
        AllocationService {
            repository,
            attempts: ALLOCATION_ATTEMPTS,
            backoff: ALLOCATION_BACKOFF,
        }
    }

    pub fn with_retry(
        repository: Arc<dyn GameServerRepository>,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        AllocationService {
            repository,
            attempts,
            backoff,
        }
    }

    /// Claims an idle server in the region. Each round lists candidates
    /// and races them through the conditional claim; a lost race just
    /// moves on to the next candidate. Store errors count as an empty
    /// round. The claimed server is marked busy before it is returned.
    pub async fn allocate(&self, region: Region) -> Result<GameServer, AllocationServiceError> {
        for attempt in 1..=self.attempts {
            match self.repository.find_available(region).await {
                Ok(candidates) => {
                    for mut server in candidates {
                        match self.repository.try_claim(&server.id).await {
                            Ok(true) => {
                                server.in_use = true;
                                info!(
                                    "Allocated game server {} in region {} on attempt {}",
                                    server.id, region, attempt
                                );
                                return Ok(server);
                            }
                            Ok(false) => {
                                debug!(
                                    "Game server {} was claimed by another allocation",
                                    server.id
                                );
                            }
                            Err(e) => {
                                warn!("Failed to claim game server {}: {}", server.id, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Game server lookup failed for region {} on attempt {}: {}",
                        region, attempt, e
                    );
                }
            }

            if attempt < self.attempts {
                sleep(self.backoff).await;
            }
        }

        Err(AllocationServiceError::NoServerAvailable)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{game_server, MockGameServerRepository};

    fn fast_service(repository: Arc<MockGameServerRepository>) -> AllocationService {
        AllocationService::with_retry(repository, 3, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_allocate_claims_idle_server() {
        let repository = Arc::new(MockGameServerRepository::with_servers(vec![game_server(
            "srv-1",
            Region::Local,
        )]));
        let service = fast_service(repository.clone());

        let server = service.allocate(Region::Local).await.unwrap();
        assert_eq!(server.id, "srv-1");
        assert!(server.in_use);

        // The claim is visible in the store before the caller sees it.
        assert!(repository.servers.lock().unwrap()["srv-1"].in_use);
    }

    #[tokio::test]
    async fn test_allocate_skips_busy_and_foreign_region_servers() {
        let mut busy = game_server("srv-busy", Region::Local);
        busy.in_use = true;
        let repository = Arc::new(MockGameServerRepository::with_servers(vec![
            busy,
            game_server("srv-au", Region::Au),
            game_server("srv-free", Region::Local),
        ]));
        let service = fast_service(repository);

        let server = service.allocate(Region::Local).await.unwrap();
        assert_eq!(server.id, "srv-free");
    }

    #[tokio::test]
    async fn test_allocate_gives_up_after_attempts() {
        let repository = Arc::new(MockGameServerRepository::new());
        let service = fast_service(repository);

        assert!(matches!(
            service.allocate(Region::Local).await,
            Err(AllocationServiceError::NoServerAvailable)
        ));
    }

    #[tokio::test]
    async fn test_allocate_treats_store_errors_as_empty_rounds() {
        let repository = Arc::new(MockGameServerRepository::with_servers(vec![game_server(
            "srv-1",
            Region::Local,
        )]));
        repository.fail_finds.store(true, Ordering::SeqCst);
        let service = fast_service(repository.clone());

        assert!(matches!(
            service.allocate(Region::Local).await,
            Err(AllocationServiceError::NoServerAvailable)
        ));

        // The server was never claimed through the failing lookups.
        assert!(!repository.servers.lock().unwrap()["srv-1"].in_use);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_never_share_a_server() {
        let repository = Arc::new(MockGameServerRepository::with_servers(vec![game_server(
            "srv-1",
            Region::Local,
        )]));
        let service = fast_service(repository);

        let (first, second) = tokio::join!(
            service.allocate(Region::Local),
            service.allocate(Region::Local)
        );

        let winners = [first, second]
            .into_iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(winners, 1);
    }
}
