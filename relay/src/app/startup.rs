use core::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::WrapErr as _;
use tokio::{net, signal};
use tracing::{info, warn};

use crate::{
    app::state::{AppState, initialize_state},
    http::router,
};

/// Resolves on SIGTERM or Ctrl-C, whichever comes first.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            core::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to create SIGTERM signal handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Serve the HTTP surface until a shutdown signal, then stop the running session.
async fn start_server(app_state: AppState, listen_ip: IpAddr, listen_port: u16) -> eyre::Result<()> {
    let controller = app_state.controller.clone();
    let app = router::create_app(app_state);

    let addr = SocketAddr::from((listen_ip, listen_port));
    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err(format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{}", addr);

    let server = axum::serve(listener, app);
    tokio::select! {
        res = server => res?,
        () = shutdown_signal() => {
            info!("Received shutdown, shutting down");
        }
    }

    controller.shutdown().await;
    Ok(())
}

/// # Returns
///
/// `Ok(())` when the server runs until termination, or an error if binding or setup fails.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the bind address is invalid,
/// or the server cannot bind.
pub async fn start(
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    info!("Starting HTTP server...");

    let app_state = initialize_state(config_path).await?;

    // Apply optional overrides from CLI/tests
    let listen_port = port_override.unwrap_or(app_state.config.server.port);
    let bind_str = bind_override.unwrap_or(&app_state.config.server.bind);

    let listen_ip: IpAddr = bind_str
        .parse()
        .wrap_err(format!("Invalid bind address: {bind_str}"))?;

    start_server(app_state, listen_ip, listen_port).await
}
