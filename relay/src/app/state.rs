use alloc::sync::Arc;
use std::path::{Path, PathBuf};

use eyre::WrapErr as _;
use tracing::info;

use crate::{
    app::runtime::start_background_tasks,
    config::{RelayConfig, load, resolve_config_relative_paths},
    fetcher::YouTubeFetcher,
    hub::BroadcastHub,
    poll::PollController,
    sink::ObsConnector,
};

/// The controller as wired up by the service: YouTube in, OBS out.
pub type Controller = PollController<YouTubeFetcher, ObsConnector>;

/// Application state shared across request handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    /// Path to the configuration file the service was started with.
    pub config_path: PathBuf,

    /// Config as loaded at startup. Start requests derive their session from it.
    pub config: Arc<RelayConfig>,

    /// The single polling session and its start/stop control.
    pub controller: Arc<Controller>,

    /// Fan-out to `/ws` listeners.
    pub hub: Arc<BroadcastHub>,

    /// Absolute path of `server.static_dir`, if configured.
    pub static_dir: Option<PathBuf>,
}

/// Builds the controller for `config`, optionally wired to `hub`.
///
/// # Errors
///
/// Returns an error if the HTTP client for the API cannot be built.
pub(super) fn build_controller(
    config: &RelayConfig,
    hub: Option<Arc<BroadcastHub>>,
) -> eyre::Result<Controller> {
    let fetcher = YouTubeFetcher::new(&config.source.api_base, config.request_timeout())
        .wrap_err("Failed to build the API client")?;
    Ok(PollController::new(fetcher, ObsConnector::default(), hub))
}

/// Emit startup warnings based on configuration.
fn emit_startup_warnings(app_state: &AppState) {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt as _;
        if let Ok(metadata) = fs::metadata(&app_state.config_path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    "Config file permissions are too permissive (current: {mode:#o}), it contains the API key. Run 'chmod 600 {}' to restrict access to owner only.",
                    app_state.config_path.display()
                );
            }
        }
    }

    if let Some(ref dir) = app_state.static_dir
        && !dir.is_dir()
    {
        tracing::warn!(
            "Static directory {} does not exist, requests will fail",
            dir.display()
        );
    }

    if app_state.config.polling.autostart && app_state.config.source.video_id.is_none() {
        tracing::warn!("Autostart is enabled but source.video_id is not set, nothing will start");
    }
}

/// Initialize application state and start background tasks.
#[tracing::instrument(skip_all)]
pub(super) async fn initialize_state(config_path: &Path) -> eyre::Result<AppState> {
    let config = Arc::new(load(config_path).await?);

    let hub = Arc::new(BroadcastHub::new());
    let controller = Arc::new(build_controller(&config, Some(Arc::clone(&hub)))?);

    let static_dir = config
        .server
        .static_dir
        .as_deref()
        .map(|dir| resolve_config_relative_paths(config_path, dir));
    if let Some(ref dir) = static_dir {
        info!("Serving static files from: {}", dir.display());
    }

    let app_state = AppState {
        config_path: config_path.to_path_buf(),
        config,
        controller,
        hub,
        static_dir,
    };

    // Start background tasks now that the full AppState is available.
    start_background_tasks(&app_state);

    emit_startup_warnings(&app_state);

    Ok(app_state)
}
