use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::models::GameServer;
use crate::repositories::game_server_repository::GameServerRepository;

/// Claims carried by a coordinator bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: TokenRole,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Player,
    Server,
}

/// The verified identity bound to a connection.
#[derive(Debug, Clone)]
pub enum Principal {
    Player { account_id: String },
    Server(GameServer),
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
    UnknownServer,
    RepositoryError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Expired token"),
            AuthError::UnknownServer => write!(f, "Unknown game server"),
            AuthError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Verifies bearer credentials into principals. Player tokens stand on
/// their own; server tokens must also resolve to a registered GameServer
/// row.
pub struct Authenticator {
    jwt_secret: String,
    server_repository: Arc<dyn GameServerRepository>,
}

impl Authenticator {
    pub fn new(server_repository: Arc<dyn GameServerRepository>) -> Self {
        let jwt_secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET environment variable must be set");
        Authenticator {
            jwt_secret,
            server_repository,
        }
    }

    pub fn with_jwt_secret(
        server_repository: Arc<dyn GameServerRepository>,
        jwt_secret: String,
    ) -> Self {
        Authenticator {
            jwt_secret,
            server_repository,
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        let token_data =
            decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken,
                }
            })?;

        match token_data.claims.role {
            TokenRole::Player => Ok(Principal::Player {
                account_id: token_data.claims.sub,
            }),
            TokenRole::Server => {
                let server = self
                    .server_repository
                    .get_server(&token_data.claims.sub)
                    .await
                    .map_err(|e| AuthError::RepositoryError(e.to_string()))?;

                match server {
                    Some(server) => Ok(Principal::Server(server)),
                    None => Err(AuthError::UnknownServer),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;
    use crate::config::Region;
    use crate::repositories::game_server_repository::tests::MockGameServerRepository;

    const TEST_SECRET: &str = "test-secret";

    fn make_token(sub: &str, role: TokenRole, expires_in_hours: i64) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: sub.to_string(),
            role,
            exp: (now + Duration::hours(expires_in_hours)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_ref()),
        )
        .unwrap()
    }

    fn test_authenticator(servers: Vec<GameServer>) -> Authenticator {
        Authenticator::with_jwt_secret(
            Arc::new(MockGameServerRepository::with_servers(servers)),
            TEST_SECRET.to_string(),
        )
    }

    #[tokio::test]
    async fn test_verify_player_token() {
        let authenticator = test_authenticator(vec![]);
        let token = make_token("acc-1", TokenRole::Player, 24);

        match authenticator.verify(&token).await.unwrap() {
            Principal::Player { account_id } => assert_eq!(account_id, "acc-1"),
            other => panic!("expected player principal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_server_token_resolves_registered_server() {
        let authenticator = test_authenticator(vec![GameServer {
            id: "srv-1".to_string(),
            region: Region::Local,
            connection_string: "game.example:7777".to_string(),
            in_use: false,
            ready: false,
        }]);
        let token = make_token("srv-1", TokenRole::Server, 24);

        match authenticator.verify(&token).await.unwrap() {
            Principal::Server(server) => assert_eq!(server.id, "srv-1"),
            other => panic!("expected server principal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_server_token_for_unregistered_server_fails() {
        let authenticator = test_authenticator(vec![]);
        let token = make_token("srv-ghost", TokenRole::Server, 24);

        assert!(matches!(
            authenticator.verify(&token).await,
            Err(AuthError::UnknownServer)
        ));
    }

    #[tokio::test]
    async fn test_verify_garbage_token_fails() {
        let authenticator = test_authenticator(vec![]);

        assert!(matches!(
            authenticator.verify("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_expired_token_fails() {
        let authenticator = test_authenticator(vec![]);
        let token = make_token("acc-1", TokenRole::Player, -2);

        assert!(matches!(
            authenticator.verify(&token).await,
            Err(AuthError::ExpiredToken)
        ));
    }
}
