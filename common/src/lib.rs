//! Wire types and formatting helpers shared by the relay service and its tests.
//!
//! This crate provides:
//! - The JSON message pushed to overlay listeners
//! - The obs-websocket v5 frames and the challenge/response authentication
//! - Display templates with a single `{count}` slot
#![expect(
    clippy::missing_errors_doc,
    reason = "The situation it maps to errors should be obvious."
)]

pub mod obs;
mod protocol;
mod template;

pub use protocol::*;
pub use template::*;

/// Default address of the OBS control socket when none is configured.
pub const DEFAULT_OBS_ENDPOINT: &str = "localhost:4455";

/// Default name of the OBS input that receives the count.
pub const DEFAULT_INPUT_NAME: &str = "LikeAlertText";
