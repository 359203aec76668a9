//! Start/stop control over the single polling session.

use alloc::sync::Arc;

use thiserror::Error as ThisError;
use tokio::{
    sync::{Mutex, broadcast, watch},
    task::JoinHandle,
};
use tracing::{Instrument as _, debug, error, info, info_span};

use super::{
    SessionEvent, SessionState, SessionStatus,
    session::{PollSession, SessionConfig, SessionConfigError},
};
use crate::{
    fetcher::CountFetcher,
    hub::BroadcastHub,
    sink::{SinkConnector, SinkError},
};

/// Capacity of the session event channel; slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum StartError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("the previous session is still stopping")]
    Stopping,
    #[error(transparent)]
    InvalidConfig(#[from] SessionConfigError),
    #[error(transparent)]
    Connection(SinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum StopError {
    #[error("no session is running")]
    NotRunning,
}

/// Handle to the spawned loop; owns the session's stop signal.
struct SessionHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// The loop publishes `Idle` as its last act, so that counts as finished even
    /// while the task is still returning.
    fn state(&self, published: SessionState) -> SessionState {
        if self.task.is_finished() || published == SessionState::Idle {
            SessionState::Idle
        } else if *self.stop_tx.borrow() {
            SessionState::Stopping
        } else {
            SessionState::Running
        }
    }
}

/// Runs at most one polling session at a time.
///
/// `start` and `stop` are serialized by an internal lock, so concurrent callers
/// always see a definite outcome: a second `start` while a session is alive is
/// rejected rather than racing the first.
pub struct PollController<F, C> {
    fetcher: Arc<F>,
    connector: C,
    hub: Option<Arc<BroadcastHub>>,
    slot: Mutex<Option<SessionHandle>>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl<F: CountFetcher, C: SinkConnector> PollController<F, C> {
    pub fn new(fetcher: F, connector: C, hub: Option<Arc<BroadcastHub>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(SessionStatus::idle());
        Self {
            fetcher: Arc::new(fetcher),
            connector,
            hub,
            slot: Mutex::new(None),
            events,
            status,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn slot_state(&self, handle: Option<&SessionHandle>) -> SessionState {
        let published = self.status.borrow().state;
        handle.map_or(SessionState::Idle, |h| h.state(published))
    }

    /// Validates `config`, opens the destination and spawns the polling loop.
    ///
    /// On error nothing is spawned and the controller stays idle.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::AlreadyRunning`] or [`StartError::Stopping`] if a session is alive,
    /// [`StartError::InvalidConfig`] for an invalid config and [`StartError::Connection`] if the
    /// destination cannot be reached.
    pub async fn start(&self, config: SessionConfig) -> Result<SessionStatus, StartError> {
        config.validate()?;

        let mut slot = self.slot.lock().await;
        match self.slot_state(slot.as_ref()) {
            SessionState::Running => return Err(StartError::AlreadyRunning),
            SessionState::Stopping => return Err(StartError::Stopping),
            SessionState::Idle => {}
        }
        if let Some(SessionHandle { task, .. }) = slot.take()
            && let Err(e) = task.await
        {
            error!("Polling task ended abnormally: {e}");
        }

        let sink = self
            .connector
            .connect(&config.target)
            .await
            .map_err(StartError::Connection)?;

        if let Some(ref hub) = self.hub {
            hub.clear_latest().await;
        }

        let video_id = config.resource_id.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        self.status.send_replace(SessionStatus::running(&config));

        let session = PollSession {
            config,
            fetcher: Arc::clone(&self.fetcher),
            sink,
            hub: self.hub.clone(),
            last_observed: None,
            fetch_failed: false,
            stop_rx,
            events: self.events.clone(),
            status: self.status.clone(),
        };
        let span = info_span!("session", %video_id);
        let task = tokio::spawn(session.run().instrument(span));
        *slot = Some(SessionHandle { stop_tx, task });

        info!(%video_id, "Polling session started");
        if self.events.send(SessionEvent::Started { video_id }).is_err() {
            debug!("No session event subscribers");
        }
        Ok(self.status())
    }

    /// Asks the running session to stop. The loop exits at its next check point.
    ///
    /// Requesting a stop while the session is already stopping is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StopError::NotRunning`] if no session is alive.
    pub async fn stop(&self) -> Result<SessionStatus, StopError> {
        let slot = self.slot.lock().await;
        let Some(handle) = slot.as_ref() else {
            return Err(StopError::NotRunning);
        };
        match self.slot_state(Some(handle)) {
            SessionState::Idle => Err(StopError::NotRunning),
            SessionState::Stopping => Ok(self.status()),
            SessionState::Running => {
                handle.stop_tx.send_replace(true);
                self.status.send_if_modified(|s| {
                    let running = s.state == SessionState::Running;
                    if running {
                        s.state = SessionState::Stopping;
                    }
                    running
                });
                info!("Stop requested");
                Ok(self.status())
            }
        }
    }

    /// Stops the session (if any) and waits for the loop to exit.
    pub async fn shutdown(&self) {
        let handle = self.slot.lock().await.take();
        if let Some(SessionHandle { stop_tx, task }) = handle {
            stop_tx.send_replace(true);
            if let Err(e) = task.await {
                error!("Polling task ended abnormally: {e}");
            }
        }
    }
}
