pub mod allocation_service_errors;
pub mod matchmaking_service_errors;
pub mod queue_service_errors;
pub mod readyup_service_errors;
