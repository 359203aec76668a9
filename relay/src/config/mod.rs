//! Configuration management for the relay: loading the TOML config file and
//! turning it into the settings of a polling session.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
