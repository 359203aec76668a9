//! Static asset serving: the built-in overlay page and an optional user-provided web UI.

use std::path::Path;

use axum::{
    Router,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::app::AppState;

macro_rules! include_asset {
    ($asset_path:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/", $asset_path))
    };
}

const OVERLAY_HTML: &str = include_asset!("overlay.html");
const OVERLAY_JS: &str = include_asset!("overlay.js");
const OVERLAY_CSS: &str = include_asset!("overlay.css");

/// Routes of the built-in overlay. With `at_root` the overlay is also served at `/`.
pub fn routes(at_root: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/overlay", get(serve_overlay))
        .route("/overlay.js", get(serve_overlay_script))
        .route("/overlay.css", get(serve_overlay_styles));
    if at_root {
        router.route("/", get(serve_overlay))
    } else {
        router
    }
}

/// Serves files from `dir`; any path without a matching file gets `index.html`.
pub fn static_files(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

async fn serve_overlay() -> impl IntoResponse {
    Html(OVERLAY_HTML)
}

async fn serve_overlay_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        OVERLAY_JS,
    )
}

async fn serve_overlay_styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], OVERLAY_CSS)
}
