use std::fmt;

#[derive(Debug)]
pub enum MatchmakingServiceError {
    RepositoryError(String),
    PublishError(String),
}

impl fmt::Display for MatchmakingServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatchmakingServiceError::RepositoryError(msg) => {
                write!(f, "Repository error: {}", msg)
            }
            MatchmakingServiceError::PublishError(msg) => write!(f, "Publish error: {}", msg),
        }
    }
}

impl std::error::Error for MatchmakingServiceError {}
