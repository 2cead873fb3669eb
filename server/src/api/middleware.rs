//! HTTP middleware (404 handler, request tracing)

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::core::constants::{HEADER_CONTACT_ID, HEADER_CONTACT_ROLE};

/// Request spans at debug level, responses logged with latency
pub fn trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if tracing::enabled!(Level::DEBUG) {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        tracing::debug!(
            method = %req.method(),
            uri = %req.uri(),
            contact_id = ?header(HEADER_CONTACT_ID),
            role = ?header(HEADER_CONTACT_ROLE),
            "[404] No route"
        );
    }
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({
            "error": "not_found",
            "code": "ROUTE_NOT_FOUND",
            "message": "No such endpoint"
        })),
    )
}
