//! Foreground mode: one session, no HTTP server, ended by a signal.

use std::path::Path;

use eyre::WrapErr as _;
use tokio::sync::watch;
use tracing::{Instrument as _, info};

use crate::{
    app::{runtime::log_session_events, shutdown_signal, state::build_controller},
    config::{SessionOverrides, load},
    poll::{SessionState, SessionStatus},
};

/// Runs a single polling session until SIGTERM/Ctrl-C.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the session cannot start,
/// e.g. because OBS is not reachable.
pub async fn run_headless(config_path: &Path, video_id: Option<String>) -> eyre::Result<()> {
    let config = load(config_path).await?;
    let controller = build_controller(&config, None)?;

    let overrides = SessionOverrides {
        video_id,
        ..SessionOverrides::default()
    };
    let session = config
        .session_config(&overrides)
        .wrap_err("Invalid session configuration")?;

    tokio::spawn(log_session_events(controller.subscribe_events()).in_current_span());
    let mut status = controller.subscribe_status();

    controller
        .start(session)
        .await
        .wrap_err("Failed to start the polling session")?;
    info!("Press Ctrl-C to stop");

    tokio::select! {
        () = shutdown_signal() => info!("Received shutdown, stopping session"),
        () = wait_for_idle(&mut status) => info!("Session ended"),
    }
    controller.shutdown().await;

    Ok(())
}

async fn wait_for_idle(status: &mut watch::Receiver<SessionStatus>) {
    if status
        .wait_for(|s| s.state == SessionState::Idle)
        .await
        .is_err()
    {
        core::future::pending::<()>().await;
    }
}
