use core::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware as ax_middleware,
    response::Redirect,
    routing::{self, IntoMakeService, any},
};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt as _, request_id::MakeRequestUuid, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    app::AppState,
    http::{
        api, assets,
        server::middleware::{LevelAdjustingOnFailure, secure_headers_middleware},
    },
    websocket,
};

/// Creates the application routes: control API, listener socket and the overlay.
///
/// When a static directory is served it owns `/`, otherwise the overlay does.
pub fn create_app_router(overlay_at_root: bool) -> Router<AppState> {
    Router::new()
        .nest("/api", api::routes())
        .route("/ws", any(websocket::ws_handler))
        .merge(assets::routes(overlay_at_root))
}

pub fn create_app(app_state: AppState) -> IntoMakeService<Router<()>> {
    #[expect(clippy::absolute_paths, reason = "I dont want conditional imports")]
    let middleware_stack = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http().on_failure(LevelAdjustingOnFailure))
        .layer(cfg_if_expr!(
            #[cfg(any(feature = "compression-br", feature = "compression-gzip"))]
            tower_http::compression::CompressionLayer::new(),
            #[cfg(not)]
            tower::layer::util::Identity::new(),
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(ax_middleware::from_fn(secure_headers_middleware));

    let router = create_app_router(app_state.static_dir.is_none());
    let router = match app_state.static_dir {
        Some(ref dir) => router.fallback_service(assets::static_files(dir)),
        None => router.fallback(routing::any(|req: Request<Body>| async move {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Unhandled request");
            Redirect::permanent("/")
        })),
    };

    router
        .with_state(app_state)
        .layer(middleware_stack)
        .into_make_service()
}
