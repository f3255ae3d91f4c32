//! REST API module using Axum
//!
//! Exposes the control plane over HTTP under `/api/v1`: tag values and
//! history, events (paged and streamed), violations, remediation triggers and
//! chaos controls.

pub mod envelope;
pub mod handlers;
mod routes;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::control_plane::ControlPlane;

/// Restrictive by default (same-origin only).
///
/// Set `PLC_HEALER_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for a dashboard served from elsewhere.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match std::env::var("PLC_HEALER_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(plane: ControlPlane) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(plane))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
