//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::control_plane::ControlPlane;

pub fn api_routes(plane: ControlPlane) -> Router {
    Router::new()
        // System
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/config", get(handlers::config))
        // Tags
        .route("/tags", get(handlers::list_tags))
        .route("/tags/:tag", get(handlers::get_tag))
        .route("/tags/:tag/history", get(handlers::tag_history))
        // Events
        .route("/events", get(handlers::list_events))
        .route("/events/stream", get(handlers::stream_events))
        // Violations
        .route("/violations", get(handlers::active_violations))
        .route("/violations/recent", get(handlers::recent_violations))
        // Remediation
        .route("/remediation", get(handlers::remediation_status))
        .route("/remediation/attempts", get(handlers::list_attempts))
        .route("/remediation/attempts/:id", get(handlers::get_attempt))
        .route("/remediation/:action", post(handlers::trigger_remediation))
        // Chaos
        .route("/chaos", get(handlers::chaos_status))
        .route("/chaos/enable", post(handlers::enable_chaos))
        .route("/chaos/disable", post(handlers::disable_chaos))
        .route("/chaos/rate", post(handlers::set_chaos_rate))
        .route("/chaos/failure_types", post(handlers::set_chaos_failure_types))
        .route("/chaos/inject", post(handlers::inject_chaos))
        .with_state(plane)
}
