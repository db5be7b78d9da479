use std::fmt;

#[derive(Debug)]
pub enum GameServerRepositoryError {
    DynamoDb(String),
    Serialization(String),
}

impl fmt::Display for GameServerRepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameServerRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            GameServerRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for GameServerRepositoryError {}
