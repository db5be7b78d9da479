pub mod allocation_service;
pub mod errors;
pub mod matchmaking_service;
pub mod queue_service;
pub mod readyup_service;

pub use allocation_service::AllocationService;
pub use matchmaking_service::MatchmakingService;
pub use queue_service::QueueService;
pub use readyup_service::ReadyUpService;
