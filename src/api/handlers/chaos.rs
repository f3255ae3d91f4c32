//! Chaos endpoints

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::chaos::{ChaosError, InjectRequest};
use crate::control_plane::ControlPlane;
use crate::types::FailureType;

fn chaos_error(e: &ChaosError) -> Response {
    match e {
        ChaosError::AlreadyActive { .. } => ApiErrorResponse::conflict(e.to_string()),
        ChaosError::UnknownTag(_) => ApiErrorResponse::not_found(e.to_string()),
        ChaosError::InvalidDuration(_) | ChaosError::InvalidRate(_) | ChaosError::NoFailureTypes => {
            ApiErrorResponse::bad_request(e.to_string())
        }
    }
}

/// GET /api/v1/chaos
pub async fn chaos_status(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.chaos_status())
}

/// POST /api/v1/chaos/enable
pub async fn enable_chaos(State(plane): State<ControlPlane>) -> Response {
    match plane.enable_chaos() {
        Ok(status) => ApiResponse::ok(status),
        Err(e) => chaos_error(&e),
    }
}

/// POST /api/v1/chaos/disable - active injections still run to expiry
pub async fn disable_chaos(State(plane): State<ControlPlane>) -> Response {
    ApiResponse::ok(plane.disable_chaos())
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
    pub rate: f64,
}

/// POST /api/v1/chaos/rate `{"rate": 0.1}`
pub async fn set_chaos_rate(
    State(plane): State<ControlPlane>,
    Json(body): Json<RateBody>,
) -> Response {
    match plane.set_chaos_rate(body.rate) {
        Ok(status) => ApiResponse::ok(status),
        Err(e) => chaos_error(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FailureTypesBody {
    pub failure_types: Vec<FailureType>,
}

/// POST /api/v1/chaos/failure_types `{"failure_types": ["network_timeout"]}`
///
/// Configured weights are dropped; draws become uniform over the new list.
pub async fn set_chaos_failure_types(
    State(plane): State<ControlPlane>,
    Json(body): Json<FailureTypesBody>,
) -> Response {
    match plane.set_chaos_failure_types(body.failure_types) {
        Ok(status) => ApiResponse::ok(status),
        Err(e) => chaos_error(&e),
    }
}

/// POST /api/v1/chaos/inject `{"failure_type": "value_anomaly", "duration_secs": 30, "target": "Motor_Speed"}`
///
/// All fields optional; omitted ones are drawn the same way a random
/// injection would draw them.
pub async fn inject_chaos(
    State(plane): State<ControlPlane>,
    Json(req): Json<InjectRequest>,
) -> Response {
    match plane.inject_chaos(req) {
        Ok(snapshot) => ApiResponse::accepted(snapshot),
        Err(e) => chaos_error(&e),
    }
}
