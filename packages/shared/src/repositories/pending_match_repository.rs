use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::PendingMatch;
use crate::repositories::errors::pending_match_repository_errors::PendingMatchRepositoryError;

/// TTL on the pending-match payload. Shorter than the acceptance window,
/// so an expired payload is always hit before a resurrected counter.
pub const PENDING_MATCH_TTL_SECS: u64 = 20;
/// TTL on the paired acknowledgement counter.
pub const ACK_COUNTER_TTL_SECS: u64 = 30;

#[async_trait]
pub trait PendingMatchRepository: Send + Sync {
    /// Writes the payload and a zeroed acknowledgement counter, each with
    /// its own TTL.
    async fn put_pending(
        &self,
        key: &str,
        pending: &PendingMatch,
    ) -> Result<(), PendingMatchRepositoryError>;

    async fn get_pending(
        &self,
        key: &str,
    ) -> Result<Option<PendingMatch>, PendingMatchRepositoryError>;

    /// Atomically increments the acknowledgement counter and returns the
    /// new count. This is the quorum protocol's single synchronization
    /// point.
    async fn incr_ack_count(&self, key: &str) -> Result<i64, PendingMatchRepositoryError>;
}

fn counter_key(key: &str) -> String {
    format!("{}.count", key)
}

pub struct RedisPendingMatchRepository {
    conn: ConnectionManager,
}

impl RedisPendingMatchRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PendingMatchRepository for RedisPendingMatchRepository {
    async fn put_pending(
        &self,
        key: &str,
        pending: &PendingMatch,
    ) -> Result<(), PendingMatchRepositoryError> {
        let payload = serde_json::to_string(pending)
            .map_err(|e| PendingMatchRepositoryError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, payload, PENDING_MATCH_TTL_SECS)
            .await
            .map_err(|e| PendingMatchRepositoryError::Redis(e.to_string()))?;
        let _: () = conn
            .set_ex(counter_key(key), 0i64, ACK_COUNTER_TTL_SECS)
            .await
            .map_err(|e| PendingMatchRepositoryError::Redis(e.to_string()))?;

        Ok(())
    }

    async fn get_pending(
        &self,
        key: &str,
    ) -> Result<Option<PendingMatch>, PendingMatchRepositoryError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| PendingMatchRepositoryError::Redis(e.to_string()))?;

        match payload {
            Some(raw) => {
                let pending: PendingMatch = serde_json::from_str(&raw)
                    .map_err(|e| PendingMatchRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(pending))
            }
            None => Ok(None),
        }
    }

    async fn incr_ack_count(&self, key: &str) -> Result<i64, PendingMatchRepositoryError> {
        let mut conn = self.conn.clone();
        conn.incr(counter_key(key), 1i64)
            .await
            .map_err(|e| PendingMatchRepositoryError::Redis(e.to_string()))
    }
}
