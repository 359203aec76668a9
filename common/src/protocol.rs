//! Messages sent from the relay to passively connected overlay listeners.
//!
//! Listeners never send anything meaningful back; the channel is server to client only.

use serde::{Deserialize, Serialize};

/// Message pushed over the `/ws` endpoint.
///
/// Serializes as `{"type":"like_update","likes":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerMessage {
    /// The like count changed (or a listener just connected and gets the latest value).
    LikeUpdate { likes: u64 },
}

impl ListenerMessage {
    #[must_use]
    pub const fn like_update(likes: u64) -> Self {
        Self::LikeUpdate { likes }
    }
}
