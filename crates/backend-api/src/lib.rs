mod error;
mod state;

pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use umlforge_config::CorsConfig;

/// Room for the non-image form fields on top of the largest accepted batch.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let limits = state.orchestrator().limits();
    // One extra image slot so an over-count batch still parses and gets the
    // JSON validation error instead of a bare 413.
    let body_limit = limits
        .max_image_bytes
        .saturating_mul(limits.max_images.saturating_add(1))
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/generate/stream",
            post(routes::generate::generate_stream).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
        .layer(cors_layer(cors))
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    if cors.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%origin, %error, "skipping invalid cors origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
