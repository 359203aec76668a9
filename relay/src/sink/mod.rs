//! Destination sinks: where a changed count gets pushed.
//!
//! A [`SinkConnector`] establishes the control channel once per session; the resulting
//! [`DestinationSink`] is then owned by the polling task and used for every update.

mod obs;

use alloc::sync::Arc;
use core::future::Future;

use likesync_common::Template;
use secrecy::SecretString;
use thiserror::Error as ThisError;

pub use obs::{ObsConnector, ObsSink};

/// How the count is rendered before it is written to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFormat {
    /// The decimal count, nothing else.
    Bare,
    /// The count substituted into a display template.
    Template(Template),
}

impl ValueFormat {
    #[must_use]
    pub fn render(&self, count: u64) -> String {
        match *self {
            Self::Bare => count.to_string(),
            Self::Template(ref template) => template.render(count),
        }
    }
}

/// Where and how updates are written. Fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SinkTarget {
    /// Address of the control socket, e.g. `localhost:4455` or `ws://host:4455`.
    pub endpoint: String,
    pub credential: Option<Arc<SecretString>>,
    /// Name of the input (scene source) that receives the value.
    pub destination_name: String,
    /// Settings key written on the input, `likes` or `text` for a text source.
    pub property: String,
    pub format: ValueFormat,
}

impl SinkTarget {
    #[must_use]
    pub fn render(&self, count: u64) -> String {
        self.format.render(count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SinkError {
    /// The control channel could not be established. Fatal for the session start.
    #[error("could not connect to '{endpoint}': {reason}")]
    Connection { endpoint: String, reason: String },
    /// A single update failed on an open channel. The session keeps polling.
    #[error("updating '{destination}' failed: {reason}")]
    Update { destination: String, reason: String },
}

/// Opens the control channel for a session.
pub trait SinkConnector: Send + Sync + 'static {
    type Sink: DestinationSink;

    /// # Errors
    ///
    /// Returns [`SinkError::Connection`] if the channel cannot be opened or the handshake fails.
    fn connect(
        &self,
        target: &SinkTarget,
    ) -> impl Future<Output = Result<Self::Sink, SinkError>> + Send;
}

/// An open control channel bound to one [`SinkTarget`].
pub trait DestinationSink: Send + 'static {
    /// Renders `count` with the target's format and writes it.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Update`] if the write or the remote request fails.
    fn push(&mut self, count: u64) -> impl Future<Output = Result<(), SinkError>> + Send;
}
