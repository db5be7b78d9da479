use std::fmt;

#[derive(Debug)]
pub enum PendingMatchRepositoryError {
    Redis(String),
    Serialization(String),
}

impl fmt::Display for PendingMatchRepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PendingMatchRepositoryError::Redis(msg) => write!(f, "Redis error: {}", msg),
            PendingMatchRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for PendingMatchRepositoryError {}
