use serde::{Deserialize, Serialize};

use crate::config::Region;

/// A pre-registered game-hosting process. The allocator flips `in_use`
/// via a conditional write; the connection hub owns `ready`, which tracks
/// whether the server currently holds a live coordinator connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServer {
    pub id: String,
    pub region: Region,
    pub connection_string: String,
    pub in_use: bool,
    pub ready: bool,
}
