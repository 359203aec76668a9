//! One polling session: fetch, compare, push, sleep, until told to stop.

use alloc::sync::Arc;
use core::time::Duration;

use chrono::Utc;
use likesync_common::TemplateError;
use secrecy::{ExposeSecret as _, SecretString};
use thiserror::Error as ThisError;
use tokio::{
    sync::{broadcast, watch},
    time::sleep,
};
use tracing::{debug, warn};

use super::{SessionEvent, SessionState, SessionStatus};
use crate::{
    fetcher::{CountFetcher, CountSnapshot},
    hub::BroadcastHub,
    sink::{DestinationSink, SinkTarget},
};

/// Everything a session needs, fixed when it starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub resource_id: String,
    pub credential: Arc<SecretString>,
    pub target: SinkTarget,
    /// Nominal delay between fetches.
    pub interval: Duration,
    /// Delay after a failed fetch.
    pub error_delay: Duration,
    /// Whether changes are also sent to the broadcast hub.
    pub broadcast: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SessionConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
}

impl SessionConfig {
    /// Checks the fields that cannot be checked by the type system.
    ///
    /// # Errors
    ///
    /// Returns the first field that is empty or zero.
    pub fn validate(&self) -> Result<(), SessionConfigError> {
        use SessionConfigError as E;

        if self.resource_id.trim().is_empty() {
            return Err(E::Empty("video id"));
        }
        if self.credential.expose_secret().trim().is_empty() {
            return Err(E::Empty("API key"));
        }
        if self.target.endpoint.trim().is_empty() {
            return Err(E::Empty("destination endpoint"));
        }
        if self.target.destination_name.trim().is_empty() {
            return Err(E::Empty("destination input name"));
        }
        if self.target.property.trim().is_empty() {
            return Err(E::Empty("destination property"));
        }
        if self.interval.is_zero() {
            return Err(E::ZeroDuration("poll interval"));
        }
        if self.error_delay.is_zero() {
            return Err(E::ZeroDuration("error delay"));
        }
        Ok(())
    }
}

/// State owned by the loop task for the lifetime of one session.
pub(super) struct PollSession<F, S> {
    pub config: SessionConfig,
    pub fetcher: Arc<F>,
    pub sink: S,
    pub hub: Option<Arc<BroadcastHub>>,
    pub last_observed: Option<u64>,
    /// Whether `last_error` currently holds a fetch failure.
    pub fetch_failed: bool,
    pub stop_rx: watch::Receiver<bool>,
    pub events: broadcast::Sender<SessionEvent>,
    pub status: watch::Sender<SessionStatus>,
}

impl<F: CountFetcher, S: DestinationSink> PollSession<F, S> {
    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No session event subscribers");
        }
    }

    /// Sleeps for `delay`, returning `false` early if a stop is requested meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = sleep(delay) => true,
            _ = self.stop_rx.wait_for(|&stop| stop) => false,
        }
    }

    /// Runs until a stop is requested or the controller is dropped.
    pub(super) async fn run(mut self) {
        loop {
            if self.stop_requested() {
                break;
            }

            let fetched = self
                .fetcher
                .fetch(&self.config.credential, &self.config.resource_id)
                .await;

            let delay = match fetched {
                Ok(snapshot) => {
                    if self.stop_requested() {
                        debug!(count = snapshot.count, "Stop requested during fetch, discarding result");
                        break;
                    }
                    if self.fetch_failed {
                        self.fetch_failed = false;
                        self.status.send_modify(|s| s.last_error = None);
                    }
                    self.observe(snapshot).await;
                    self.config.interval
                }
                Err(error) => {
                    warn!(video_id = %self.config.resource_id, "Fetching like count failed: {error}");
                    let message = error.to_string();
                    self.status.send_modify(|s| s.last_error = Some(message));
                    self.fetch_failed = true;
                    self.emit(SessionEvent::FetchFailed {
                        error,
                        retry_in: self.config.error_delay,
                    });
                    self.config.error_delay
                }
            };

            if !self.pause(delay).await {
                break;
            }
        }

        let last_count = self.last_observed;
        self.status.send_modify(|s| s.state = SessionState::Idle);
        self.emit(SessionEvent::Stopped { last_count });
    }

    /// Pushes, records and announces `snapshot` if its count differs from the last one.
    async fn observe(&mut self, snapshot: CountSnapshot) {
        let count = snapshot.count;
        if self.last_observed == Some(count) {
            debug!(count, "Like count unchanged");
            return;
        }
        self.last_observed = Some(count);

        let pushed = self.sink.push(count).await;

        self.status.send_modify(|s| {
            s.last_count = Some(count);
            s.last_observed_at = Some(snapshot.observed_at);
            s.last_error = pushed.as_ref().err().map(ToString::to_string);
        });
        if let Err(error) = pushed {
            self.emit(SessionEvent::UpdateFailed(error));
        }

        if self.config.broadcast
            && let Some(ref hub) = self.hub
        {
            let delivered = hub.broadcast(count).await;
            debug!(count, delivered, "Broadcast like count");
        }

        self.emit(SessionEvent::CountChanged(snapshot));
    }
}

impl SessionStatus {
    pub(super) fn running(config: &SessionConfig) -> Self {
        Self {
            state: SessionState::Running,
            video_id: Some(config.resource_id.clone()),
            started_at: Some(Utc::now()),
            ..Self::idle()
        }
    }
}
