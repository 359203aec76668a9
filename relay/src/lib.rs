//! Library entry for the `relay` service.
//!
//! Exposes `inner_main` so a workspace-level shim binary can call into the relay logic.
//!
//! Provides commands to run the HTTP control service or a single headless polling session.
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "This is not problematic in tests",)
)]

extern crate alloc;
extern crate core;

pub mod app;
pub mod cli;
pub mod config;
pub mod fetcher;
pub mod http;
pub mod hub;
pub mod poll;
pub mod sink;
pub mod websocket;

// for use in integration tests
pub use likesync_common::ListenerMessage;

use std::env;
use std::fs;
use std::sync::Once;

use eyre::{Result, WrapErr as _};
use tracing::{Instrument as _, debug, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();
static INIT_RUSTLS: Once = Once::new();

/// Installs the process wide rustls crypto provider used by the outbound HTTP client.
///
/// Safe to call repeatedly; only the first call has an effect.
pub fn install_crypto_provider() {
    INIT_RUSTLS.call_once(|| {
        if rustls_openssl::default_provider().install_default().is_err() {
            debug!("A rustls crypto provider was already installed");
        }
    });
}

fn init_tracing(log_format: LogFormat) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("LIKESYNC_INTEGRATION_TEST").is_ok() {
            "error"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339());

        match log_format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// The relay's main function; can be called from a shim binary.
///
/// Dispatches to the HTTP control service or a headless session.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, the server fails to start,
/// or a headless session cannot be started.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    init_tracing(invocation.log_format);
    install_crypto_provider();

    match invocation.command {
        Command::Serve(args) => {
            let config = &args.config;
            let config_path =
                fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

            let startup_span = tracing::info_span!("relay.startup", ?config_path, pid=?std::process::id(), version = env!("CARGO_PKG_VERSION"));

            async {
                info!("Starting relay service");
                app::start(&config_path, args.port, args.bind.as_deref()).await
            }
            .instrument(startup_span)
            .await
        }
        Command::Run(args) => {
            let config = &args.config;
            let config_path =
                fs::canonicalize(config).wrap_err(format!("Config file not found at: {config}"))?;

            let run_span = tracing::info_span!("relay.headless", ?config_path);
            app::run_headless(&config_path, args.video_id)
                .instrument(run_span)
                .await
        }
    }
}
