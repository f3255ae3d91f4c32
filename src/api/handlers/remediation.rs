//! Remediation endpoints: manual trigger and attempt status

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::LimitQuery;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::control_plane::ControlPlane;
use crate::remediation::TriggerError;
use crate::types::RemediationAction;

#[derive(Debug, Default, Deserialize)]
pub struct TriggerBody {
    /// Tag the operator is reacting to, for the job variables.
    pub tag: Option<String>,
}

/// POST /api/v1/remediation/:action
///
/// `action` is `stop|reset|restart|gather_metrics` (or the `emergency_*`
/// template key). 202 with the new attempt; 429 while the action cools down;
/// 409 while an attempt for it is in flight.
pub async fn trigger_remediation(
    State(plane): State<ControlPlane>,
    Path(action): Path<String>,
    body: Option<Json<TriggerBody>>,
) -> Response {
    let Some(action) = RemediationAction::from_template_key(&action) else {
        return ApiErrorResponse::not_found(format!("Unknown remediation action '{action}'"));
    };
    let tag = body.and_then(|Json(b)| b.tag);

    match plane.trigger_remediation(action, tag) {
        Ok(attempt) => ApiResponse::accepted(attempt),
        Err(e @ TriggerError::CooldownActive { .. }) => ApiErrorResponse::too_many_requests(e.to_string()),
        Err(e @ TriggerError::InFlight { .. }) => ApiErrorResponse::conflict(e.to_string()),
        Err(e @ TriggerError::TemplateMissing(_)) => ApiErrorResponse::bad_request(e.to_string()),
        Err(e @ TriggerError::ShuttingDown) => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}

/// GET /api/v1/remediation - per-action phase, cooldowns, deferred violations
pub async fn remediation_status(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.remediation_status())
}

/// GET /api/v1/remediation/attempts?limit=N - newest first
pub async fn list_attempts(
    State(plane): State<ControlPlane>,
    Query(q): Query<LimitQuery>,
) -> Response {
    ApiResponse::ok(plane.attempts(q.resolve()))
}

/// GET /api/v1/remediation/attempts/:id
pub async fn get_attempt(State(plane): State<ControlPlane>, Path(id): Path<u64>) -> Response {
    match plane.attempt(id) {
        Some(attempt) => ApiResponse::ok(attempt),
        None => ApiErrorResponse::not_found(format!("No remediation attempt {id}")),
    }
}
