use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_item};

use crate::config::{GameType, Region};
use crate::models::QueueSession;
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;

#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Writes the session keyed by its owning account id, replacing any
    /// entry that account already had.
    async fn upsert_session(&self, session: &QueueSession) -> Result<(), QueueRepositoryError>;

    /// Resolves the session the account owns or rides on as a party
    /// member, in one lookup.
    async fn find_by_account_or_party(
        &self,
        account_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError>;

    async fn find_by_id(
        &self,
        session_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError>;

    async fn delete_by_account(&self, account_id: &str) -> Result<(), QueueRepositoryError>;

    /// All sessions waiting in a (game type, region) pool, oldest first.
    async fn list_pool(
        &self,
        game_type: GameType,
        region: Region,
    ) -> Result<Vec<QueueSession>, QueueRepositoryError>;

    async fn delete_by_ids(&self, session_ids: &[String]) -> Result<(), QueueRepositoryError>;
}

pub struct DynamoDbQueueRepository {
    pub client: Client,
    pub table_name: String,
}

/// Index on the session `id` attribute, for lookups by session id.
const ID_INDEX: &str = "id-index";
/// Index partitioned by the `pool` attribute with `created_at` as sort
/// key, for time-ordered pool scans.
const POOL_INDEX: &str = "pool-index";

impl DynamoDbQueueRepository {
    pub fn new(client: Client) -> Self {
        let table_name =
            std::env::var("QUEUE_TABLE").expect("QUEUE_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl QueueRepository for DynamoDbQueueRepository {
    async fn upsert_session(&self, session: &QueueSession) -> Result<(), QueueRepositoryError> {
        let item =
            to_item(session).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn find_by_account_or_party(
        &self,
        account_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError> {
        // Owned session first: the account id is the partition key.
        let owned = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("account_id", AttributeValue::S(account_id.to_string()))
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = owned.item {
            let session: QueueSession =
                from_item(item).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
            return Ok(Some(session));
        }

        // Otherwise the account may be riding on someone else's session.
        let scan_result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("contains(party_members, :account_id)")
            .expression_attribute_values(":account_id", AttributeValue::S(account_id.to_string()))
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = scan_result.items.unwrap_or_default().into_iter().next() {
            let session: QueueSession =
                from_item(item).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
            return Ok(Some(session));
        }

        Ok(None)
    }

    async fn find_by_id(
        &self,
        session_id: &str,
    ) -> Result<Option<QueueSession>, QueueRepositoryError> {
        let query_result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(ID_INDEX)
            .key_condition_expression("id = :id")
            .expression_attribute_values(":id", AttributeValue::S(session_id.to_string()))
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = query_result.items.unwrap_or_default().into_iter().next() {
            let session: QueueSession =
                from_item(item).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
            return Ok(Some(session));
        }

        Ok(None)
    }

    async fn delete_by_account(&self, account_id: &str) -> Result<(), QueueRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("account_id", AttributeValue::S(account_id.to_string()))
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn list_pool(
        &self,
        game_type: GameType,
        region: Region,
    ) -> Result<Vec<QueueSession>, QueueRepositoryError> {
        let pool = QueueSession::pool_key(game_type, region);

        let query_result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(POOL_INDEX)
            .key_condition_expression("pool = :pool")
            .expression_attribute_values(":pool", AttributeValue::S(pool))
            .scan_index_forward(true)
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        let mut sessions = Vec::new();
        for item in query_result.items.unwrap_or_default() {
            let session: QueueSession =
                from_item(item).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
            sessions.push(session);
        }

        // Oldest first, matching the index sort key.
        sessions.sort_by_key(|session| session.created_at);

        Ok(sessions)
    }

    async fn delete_by_ids(&self, session_ids: &[String]) -> Result<(), QueueRepositoryError> {
        for session_id in session_ids {
            if let Some(session) = self.find_by_id(session_id).await? {
                self.delete_by_account(&session.account_id).await?;
            }
        }
        Ok(())
    }
}
