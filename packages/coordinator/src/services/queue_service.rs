use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use shared::config::{GameType, Region};
use shared::models::QueueSession;
use shared::repositories::queue_repository::QueueRepository;

use crate::services::errors::queue_service_errors::QueueServiceError;

/// Owns enqueue/dequeue of players into regional/game-type pools.
#[derive(Clone)]
pub struct QueueService {
    repository: Arc<dyn QueueRepository>,
}

impl QueueService {
    pub fn new(repository: Arc<dyn QueueRepository>) -> Self {
        QueueService { repository }
    }

    /// Upserts the account's queue session; an account that was already
    /// queued gets its region/game-type replaced rather than a second
    /// entry. Party members ride on the created session.
    pub async fn enqueue(
        &self,
        account_id: &str,
        region: Region,
        game_type: GameType,
        party_members: Vec<String>,
    ) -> Result<QueueSession, QueueServiceError> {
        if account_id.is_empty() {
            return Err(QueueServiceError::ValidationError(
                "Account id cannot be empty".to_string(),
            ));
        }
        if game_type == GameType::None {
            return Err(QueueServiceError::ValidationError(
                "Game type must be selected".to_string(),
            ));
        }

        // The owner never rides as their own party member; drop repeats.
        let mut seen = HashSet::new();
        let party_members: Vec<String> = party_members
            .into_iter()
            .filter(|member| member != account_id && seen.insert(member.clone()))
            .collect();

        let session = QueueSession::new(account_id, region, game_type, party_members);

        self.repository
            .upsert_session(&session)
            .await
            .map_err(|e| QueueServiceError::RepositoryError(e.to_string()))?;

        info!(
            "Queue session {} created for account {} in pool {}",
            session.id, account_id, session.pool
        );

        Ok(session)
    }

    /// Deletes the session the account owns or rides on as a party
    /// member. Returns the deleted session so callers can notify the
    /// remaining participants; None when nothing was queued.
    pub async fn leave_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<QueueSession>, QueueServiceError> {
        let session = self
            .repository
            .find_by_account_or_party(account_id)
            .await
            .map_err(|e| QueueServiceError::RepositoryError(e.to_string()))?;

        let Some(session) = session else {
            return Ok(None);
        };

        self.repository
            .delete_by_account(&session.account_id)
            .await
            .map_err(|e| QueueServiceError::RepositoryError(e.to_string()))?;

        info!("Queue session {} terminated", session.id);
        Ok(Some(session))
    }

    /// Deletes by session id; same return contract as leave_by_account.
    pub async fn leave_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<QueueSession>, QueueServiceError> {
        let session = self
            .repository
            .find_by_id(session_id)
            .await
            .map_err(|e| QueueServiceError::RepositoryError(e.to_string()))?;

        let Some(session) = session else {
            return Ok(None);
        };

        self.repository
            .delete_by_account(&session.account_id)
            .await
            .map_err(|e| QueueServiceError::RepositoryError(e.to_string()))?;

        info!("Queue session {} terminated", session.id);
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::MockQueueRepository;

    #[tokio::test]
    async fn test_enqueue_replaces_existing_entry_for_account() {
        let repository = Arc::new(MockQueueRepository::new());
        let service = QueueService::new(repository.clone());

        let first = service
            .enqueue("acc-1", Region::Local, GameType::Custom, vec![])
            .await
            .unwrap();
        let second = service
            .enqueue("acc-1", Region::Au, GameType::Ranked, vec![])
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(repository.session_count(), 1);

        let remaining = repository.sessions.lock().unwrap()[0].clone();
        assert_eq!(remaining.region, Region::Au);
        assert_eq!(remaining.game_type, GameType::Ranked);
    }

    #[tokio::test]
    async fn test_enqueue_drops_owner_and_duplicates_from_party() {
        let repository = Arc::new(MockQueueRepository::new());
        let service = QueueService::new(repository);

        let session = service
            .enqueue(
                "acc-1",
                Region::Local,
                GameType::Custom,
                vec![
                    "acc-1".to_string(),
                    "acc-2".to_string(),
                    "acc-2".to_string(),
                    "acc-3".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(session.party_members, vec!["acc-2", "acc-3"]);
        assert_eq!(session.player_count(), 3);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unselected_game_type() {
        let service = QueueService::new(Arc::new(MockQueueRepository::new()));

        let result = service
            .enqueue("acc-1", Region::Local, GameType::None, vec![])
            .await;

        assert!(matches!(
            result,
            Err(QueueServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_surfaces_store_failure() {
        let repository = Arc::new(MockQueueRepository::new());
        repository.fail.store(true, Ordering::SeqCst);
        let service = QueueService::new(repository);

        let result = service
            .enqueue("acc-1", Region::Local, GameType::Custom, vec![])
            .await;

        assert!(matches!(
            result,
            Err(QueueServiceError::RepositoryError(_))
        ));
    }

    #[tokio::test]
    async fn test_leave_by_account_covers_party_membership() {
        let repository = Arc::new(MockQueueRepository::new());
        let service = QueueService::new(repository.clone());

        let session = service
            .enqueue(
                "acc-1",
                Region::Local,
                GameType::Custom,
                vec!["acc-2".to_string()],
            )
            .await
            .unwrap();

        // A party member leaving tears down the session they ride on.
        let left = service.leave_by_account("acc-2").await.unwrap().unwrap();
        assert_eq!(left.id, session.id);
        assert_eq!(repository.session_count(), 0);
    }

    #[tokio::test]
    async fn test_leave_by_account_without_session_is_not_an_error() {
        let service = QueueService::new(Arc::new(MockQueueRepository::new()));
        assert!(service.leave_by_account("acc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leave_by_session_deletes_by_id() {
        let repository = Arc::new(MockQueueRepository::new());
        let service = QueueService::new(repository.clone());

        let session = service
            .enqueue("acc-1", Region::Local, GameType::Custom, vec![])
            .await
            .unwrap();

        let left = service
            .leave_by_session(&session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(left.account_id, "acc-1");
        assert_eq!(repository.session_count(), 0);

        assert!(service
            .leave_by_session(&session.id)
            .await
            .unwrap()
            .is_none());
    }
}
