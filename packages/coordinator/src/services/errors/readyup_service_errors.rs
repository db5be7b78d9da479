use std::fmt;

#[derive(Debug)]
pub enum ReadyUpServiceError {
    RepositoryError(String),
}

impl fmt::Display for ReadyUpServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadyUpServiceError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for ReadyUpServiceError {}
