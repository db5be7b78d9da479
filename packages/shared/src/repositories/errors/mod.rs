pub mod game_repository_errors;
pub mod game_server_repository_errors;
pub mod pending_match_repository_errors;
pub mod queue_repository_errors;
