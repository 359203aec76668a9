//! Background tasks for the relay service.

use alloc::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{Instrument as _, debug, error, info, warn};

use crate::{
    app::{AppState, Controller},
    config::{RelayConfig, SessionOverrides},
    poll::SessionEvent,
};

/// One-line, human readable form of a session event.
#[must_use]
pub fn describe_event(event: &SessionEvent) -> String {
    match *event {
        SessionEvent::Started { ref video_id } => format!("Polling video {video_id}"),
        SessionEvent::CountChanged(snapshot) => format!(
            "Likes: {} (at {})",
            snapshot.count,
            snapshot.observed_at.format("%H:%M:%S")
        ),
        SessionEvent::FetchFailed {
            ref error,
            retry_in,
        } => format!("Fetch failed: {error}, retrying in {}s", retry_in.as_secs()),
        SessionEvent::UpdateFailed(ref error) => format!("Update failed: {error}"),
        SessionEvent::Stopped {
            last_count: Some(count),
        } => format!("Stopped at {count} likes"),
        SessionEvent::Stopped { last_count: None } => "Stopped".to_string(),
    }
}

/// Logs every session event until the controller goes away.
pub(super) async fn log_session_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let line = describe_event(&event);
                match event {
                    SessionEvent::FetchFailed { .. } | SessionEvent::UpdateFailed(_) => {
                        warn!("{line}");
                    }
                    SessionEvent::Started { .. }
                    | SessionEvent::CountChanged(_)
                    | SessionEvent::Stopped { .. } => info!("{line}"),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Event logger lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Starts a session with the config's defaults, as if `POST /api/session/start` was called.
async fn autostart(controller: Arc<Controller>, config: Arc<RelayConfig>) {
    let session = match config.session_config(&SessionOverrides::default()) {
        Ok(session) => session,
        Err(e) => {
            error!("Autostart skipped, invalid session config: {e}");
            return;
        }
    };
    match controller.start(session).await {
        Ok(status) => debug!(?status, "Autostarted session"),
        Err(e) => error!("Autostart failed: {e}"),
    }
}

pub(super) fn start_background_tasks(state: &AppState) {
    // Session events to the log
    tokio::spawn(log_session_events(state.controller.subscribe_events()).in_current_span());

    if state.config.polling.autostart {
        let controller = Arc::clone(&state.controller);
        let config = Arc::clone(&state.config);
        tokio::spawn(
            async move {
                autostart(controller, config).await;
            }
            .in_current_span(),
        );
    }
}
