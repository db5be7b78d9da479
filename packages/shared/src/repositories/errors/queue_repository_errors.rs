use std::fmt;

#[derive(Debug)]
pub enum QueueRepositoryError {
    DynamoDb(String),
    Serialization(String),
}

impl fmt::Display for QueueRepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            QueueRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for QueueRepositoryError {}
