//! System endpoints: health, status, config

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::api::envelope::ApiResponse;
use crate::control_plane::ControlPlane;
use crate::monitor::ConnectionState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connection: ConnectionState,
    pub version: &'static str,
}

/// GET /api/v1/health
pub async fn health(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        connection: plane.link_stats().state,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/status
pub async fn status(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.status())
}

/// GET /api/v1/config - validated configuration, automation token omitted
pub async fn config(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.config().clone())
}
