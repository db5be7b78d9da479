pub mod game;
pub mod game_server;
pub mod pending_match;
pub mod queue_session;

pub use game::Game;
pub use game_server::GameServer;
pub use pending_match::{AssignedPlayer, PendingMatch, Team};
pub use queue_session::QueueSession;
