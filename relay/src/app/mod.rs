mod headless;
mod runtime;
mod startup;
mod state;

pub use headless::run_headless;
pub use runtime::describe_event;
pub use startup::{shutdown_signal, start};
pub use state::{AppState, Controller};
