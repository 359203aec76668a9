//! HTTP surface of the relay: session control API, static assets and the listener socket.

pub mod api;
pub mod assets;
pub mod server;

pub use server::*;
