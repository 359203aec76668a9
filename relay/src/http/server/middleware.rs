use core::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::{
    classify::ServerErrorsFailureClass,
    trace::{DefaultOnFailure, OnFailure},
};

/// Custom failure handling for the trace layer. 502 responses (OBS not reachable on
/// session start) are logged at `INFO` instead of `ERROR`; they are already reported
/// to the caller and logged by the start handler.
#[derive(Clone, Copy)]
pub struct LevelAdjustingOnFailure;

impl OnFailure<ServerErrorsFailureClass> for LevelAdjustingOnFailure {
    fn on_failure(
        &mut self,
        failure_classification: ServerErrorsFailureClass,
        latency: Duration,
        span: &tracing::Span,
    ) {
        use ServerErrorsFailureClass as S;

        match failure_classification {
            S::StatusCode(StatusCode::BAD_GATEWAY) => {
                tracing::info!(classification = %S::StatusCode(StatusCode::BAD_GATEWAY), latency = %format!("{} ms", latency.as_millis()), "response failed (downgraded)");
            }
            value => {
                DefaultOnFailure::default().on_failure(value, latency, span);
            }
        }
    }
}

/// Middleware to set security headers on all responses.
///
/// Framing is allowed so the overlay can be embedded, e.g. as an OBS browser source.
pub async fn secure_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(concat!(
            "default-src 'self'; ",
            "connect-src 'self'; ",
            "object-src 'none'; ",
            "base-uri 'none'; ",
            "frame-src 'none'; ",
            "media-src 'none'; ",
        )),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    response
}
