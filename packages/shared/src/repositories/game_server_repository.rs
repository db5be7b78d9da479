use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::from_item;

use crate::config::Region;
use crate::models::GameServer;
use crate::repositories::errors::game_server_repository_errors::GameServerRepositoryError;

#[async_trait]
pub trait GameServerRepository: Send + Sync {
    async fn get_server(
        &self,
        server_id: &str,
    ) -> Result<Option<GameServer>, GameServerRepositoryError>;

    /// Servers in the region currently free to host a match: not in use
    /// and holding a live coordinator connection.
    async fn find_available(
        &self,
        region: Region,
    ) -> Result<Vec<GameServer>, GameServerRepositoryError>;

    /// Atomically claims the server for a match. Returns false when
    /// another allocation won the race.
    async fn try_claim(&self, server_id: &str) -> Result<bool, GameServerRepositoryError>;

    async fn set_ready(
        &self,
        server_id: &str,
        ready: bool,
    ) -> Result<(), GameServerRepositoryError>;
}

pub struct DynamoDbGameServerRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbGameServerRepository {
    pub fn new(client: Client) -> Self {
        let table_name = std::env::var("GAME_SERVERS_TABLE")
            .expect("GAME_SERVERS_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl GameServerRepository for DynamoDbGameServerRepository {
    async fn get_server(
        &self,
        server_id: &str,
    ) -> Result<Option<GameServer>, GameServerRepositoryError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(server_id.to_string()))
            .send()
            .await
            .map_err(|e| GameServerRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = resp.item {
            let server: GameServer = from_item(item)
                .map_err(|e| GameServerRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(server))
        } else {
            Ok(None)
        }
    }

    async fn find_available(
        &self,
        region: Region,
    ) -> Result<Vec<GameServer>, GameServerRepositoryError> {
        let scan_result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("#region = :region AND in_use = :in_use AND #ready = :ready")
            .expression_attribute_names("#region", "region")
            .expression_attribute_names("#ready", "ready")
            .expression_attribute_values(":region", AttributeValue::S(region.to_string()))
            .expression_attribute_values(":in_use", AttributeValue::Bool(false))
            .expression_attribute_values(":ready", AttributeValue::Bool(true))
            .send()
            .await
            .map_err(|e| GameServerRepositoryError::DynamoDb(e.to_string()))?;

        let mut servers = Vec::new();
        for item in scan_result.items.unwrap_or_default() {
            let server: GameServer = from_item(item)
                .map_err(|e| GameServerRepositoryError::Serialization(e.to_string()))?;
            servers.push(server);
        }

        Ok(servers)
    }

    async fn try_claim(&self, server_id: &str) -> Result<bool, GameServerRepositoryError> {
        // Conditional write: only one allocation can flip in_use.
        let update_result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(server_id.to_string()))
            .update_expression("SET in_use = :claimed")
            .condition_expression("attribute_exists(id) AND in_use = :free")
            .expression_attribute_values(":claimed", AttributeValue::Bool(true))
            .expression_attribute_values(":free", AttributeValue::Bool(false))
            .send()
            .await;

        match update_result {
            Ok(_) => Ok(true),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Ok(false); // Claimed by another allocation in the meantime.
                    }
                }
                Err(GameServerRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn set_ready(
        &self,
        server_id: &str,
        ready: bool,
    ) -> Result<(), GameServerRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(server_id.to_string()))
            .update_expression("SET #ready = :ready")
            .expression_attribute_names("#ready", "ready")
            .expression_attribute_values(":ready", AttributeValue::Bool(ready))
            .send()
            .await
            .map_err(|e| GameServerRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory stand-in used by authenticator and service tests.
    pub struct MockGameServerRepository {
        pub servers: Mutex<HashMap<String, GameServer>>,
    }

    impl MockGameServerRepository {
        pub fn with_servers(servers: Vec<GameServer>) -> Self {
            Self {
                servers: Mutex::new(
                    servers
                        .into_iter()
                        .map(|server| (server.id.clone(), server))
                        .collect(),
                ),
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
            Ok(self
                .servers
                .lock()
                .unwrap()
                .values()
                .filter(|server| server.region == region && !server.in_use && server.ready)
                .cloned()
                .collect())
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

    #[tokio::test]
    async fn test_mock_claim_is_exclusive() {
        let repository = MockGameServerRepository::with_servers(vec![GameServer {
            id: "srv-1".to_string(),
            region: Region::Local,
            connection_string: "game.example:7777".to_string(),
            in_use: false,
            ready: true,
        }]);

        assert!(repository.try_claim("srv-1").await.unwrap());
        assert!(!repository.try_claim("srv-1").await.unwrap());
        assert!(repository
            .find_available(Region::Local)
            .await
            .unwrap()
            .is_empty());
    }
}
