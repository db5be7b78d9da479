use std::fmt;

#[derive(Debug)]
pub enum AllocationServiceError {
    /// Every attempt came up empty; waiting sessions stay queued.
    NoServerAvailable,
}

impl fmt::Display for AllocationServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocationServiceError::NoServerAvailable => {
                write!(f, "No game server available")
            }
        }
    }
}

impl std::error::Error for AllocationServiceError {}
