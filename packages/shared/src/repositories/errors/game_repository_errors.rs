use std::fmt;

#[derive(Debug)]
pub enum GameRepositoryError {
    DynamoDb(String),
    Serialization(String),
}

impl fmt::Display for GameRepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            GameRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for GameRepositoryError {}
