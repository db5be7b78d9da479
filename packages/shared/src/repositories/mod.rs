pub mod errors;
pub mod game_repository;
pub mod game_server_repository;
pub mod pending_match_repository;
pub mod queue_repository;
