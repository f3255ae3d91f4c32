//! Tag and violation endpoints

use axum::extract::{Path, Query, State};
use axum::response::Response;

use super::LimitQuery;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::control_plane::ControlPlane;

/// GET /api/v1/tags - latest value and violation flag per tag
pub async fn list_tags(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.tags())
}

/// GET /api/v1/tags/:tag - config, latest reading and open violation
pub async fn get_tag(State(plane): State<ControlPlane>, Path(tag): Path<String>) -> Response {
    match plane.tag(&tag) {
        Some(detail) => ApiResponse::ok(detail),
        None => ApiErrorResponse::not_found(format!("Unknown tag '{tag}'")),
    }
}

/// GET /api/v1/tags/:tag/history?limit=N - newest last
pub async fn tag_history(
    State(plane): State<ControlPlane>,
    Path(tag): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Response {
    match plane.tag_history(&tag, q.resolve()) {
        Some(readings) => ApiResponse::ok(readings),
        None => ApiErrorResponse::not_found(format!("Unknown tag '{tag}'")),
    }
}

/// GET /api/v1/violations
pub async fn active_violations(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.active_violations())
}

/// GET /api/v1/violations/recent?limit=N - active and resolved, newest first
pub async fn recent_violations(
    State(plane): State<ControlPlane>,
    Query(q): Query<LimitQuery>,
) -> Response {
    ApiResponse::ok(plane.recent_violations(q.resolve()))
}
