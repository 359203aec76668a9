//! Fan-out of count updates to passively connected listeners.
//!
//! Listeners are bounded queues; a listener whose queue is closed or full is
//! dropped on the next broadcast. There is no explicit unregister.

use std::collections::HashMap;

use likesync_common::ListenerMessage;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Queue depth per listener before it counts as dead.
pub const LISTENER_QUEUE_DEPTH: usize = 16;

pub type ListenerHandle = mpsc::Sender<ListenerMessage>;
pub type ListenerId = u64;

#[derive(Debug, Default)]
struct Listeners {
    handles: HashMap<ListenerId, ListenerHandle>,
    next_id: ListenerId,
    latest: Option<u64>,
}

#[derive(Debug, Default)]
pub struct BroadcastHub {
    inner: Mutex<Listeners>,
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `listener` to the set. If a count was broadcast before, it is delivered right away.
    ///
    /// Returns `None` if that initial delivery already failed; the listener is not added then.
    pub async fn register(&self, listener: ListenerHandle) -> Option<ListenerId> {
        let mut inner = self.inner.lock().await;
        if let Some(likes) = inner.latest
            && listener
                .try_send(ListenerMessage::like_update(likes))
                .is_err()
        {
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handles.insert(id, listener);
        debug!(id, listeners = inner.handles.len(), "Listener registered");
        Some(id)
    }

    /// Creates a listener queue, registers it and returns its receiving end.
    pub async fn connect(&self) -> mpsc::Receiver<ListenerMessage> {
        let (tx, rx) = mpsc::channel(LISTENER_QUEUE_DEPTH);
        if self.register(tx).await.is_none() {
            debug!("Listener queue closed before registration");
        }
        rx
    }

    /// Sends `{"type":"like_update","likes":count}` to every listener, pruning failed ones.
    ///
    /// Returns the number of listeners that accepted the message.
    pub async fn broadcast(&self, count: u64) -> usize {
        let mut inner = self.inner.lock().await;
        inner.latest = Some(count);
        let msg = ListenerMessage::like_update(count);
        inner.handles.retain(|&id, handle| match handle.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!(id, "Dropping listener: {e}");
                false
            }
        });
        inner.handles.len()
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.lock().await.handles.len()
    }

    /// Forgets the last broadcast count so new listeners wait for a fresh one.
    pub async fn clear_latest(&self) {
        self.inner.lock().await.latest = None;
    }

    /// The last broadcast count, if any.
    pub async fn latest(&self) -> Option<u64> {
        self.inner.lock().await.latest
    }
}
