//! The polling-and-sync loop and its controller.
//!
//! [`PollController`] owns at most one running [`session`] at a time. Everything the
//! loop observes is published on two channels: a `watch` with the current
//! [`SessionStatus`] and a `broadcast` of [`SessionEvent`]s for the presentation layer.

mod controller;
mod session;

use core::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    fetcher::{CountSnapshot, FetchError},
    sink::SinkError,
};

pub use controller::{PollController, StartError, StopError};
pub use session::{SessionConfig, SessionConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Snapshot of the controller, as shown to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub video_id: Option<String>,
    pub last_count: Option<u64>,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub(crate) const fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            video_id: None,
            last_count: None,
            last_observed_at: None,
            last_error: None,
            started_at: None,
        }
    }
}

/// Things the loop reports while running.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { video_id: String },
    CountChanged(CountSnapshot),
    FetchFailed { error: FetchError, retry_in: Duration },
    UpdateFailed(SinkError),
    Stopped { last_count: Option<u64> },
}
