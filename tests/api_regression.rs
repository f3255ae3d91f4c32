//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use plc_healer::api::create_app;
use plc_healer::{
    AppConfig, ControlPlane, FailureCondition, PollingMonitor, RemediationAction,
    SimulatedAutomation, SimulatedDevice, SimulatedDeviceHandle, TagConfig, TagValue, ValueType,
};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const MOTOR: &str = "Program:MainProgram.Motor_Speed";

fn test_config() -> AppConfig {
    let mut config = AppConfig::with_tags(vec![TagConfig {
        key: "Motor_Speed".to_string(),
        device_name: MOTOR.to_string(),
        value_type: ValueType::Integer,
        nominal: TagValue::Integer(1750),
        condition: FailureCondition::OutsideRange {
            low: 1500.0,
            high: 2000.0,
        },
        remediation_action: RemediationAction::Reset,
    }]);
    config.chaos.startup_grace = Duration::ZERO;
    config
}

fn create_test_plane(
    config: AppConfig,
) -> (ControlPlane, PollingMonitor<SimulatedDevice>, SimulatedDeviceHandle) {
    let device = SimulatedDevice::new("test-plc", &config.tags, 0.0);
    let handle = device.handle();
    let client = Arc::new(SimulatedAutomation::new(Duration::from_secs(1), 0.0));
    let (plane, monitor) = ControlPlane::build(config, device, client);
    (plane, monitor, handle)
}

async fn send(plane: &ControlPlane, method: &str, uri: &str, body: Option<&str>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    create_app(plane.clone()).oneshot(request).await.unwrap()
}

async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All v1 GET endpoints should return 200.
#[tokio::test]
async fn test_v1_get_endpoints_return_200() {
    let (plane, mut monitor, _) = create_test_plane(test_config());
    monitor.tick().await;

    let endpoints = [
        "/api/v1/health",
        "/api/v1/status",
        "/api/v1/config",
        "/api/v1/tags",
        "/api/v1/tags/Motor_Speed",
        "/api/v1/tags/Motor_Speed/history",
        "/api/v1/events",
        "/api/v1/events?since=0&type=connection_restored",
        "/api/v1/violations",
        "/api/v1/violations/recent?limit=5",
        "/api/v1/remediation",
        "/api/v1/remediation/attempts",
        "/api/v1/chaos",
    ];

    for endpoint in &endpoints {
        let resp = send(&plane, "GET", endpoint, None).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {endpoint} returned {}", resp.status());
        let json = json_body(resp).await;
        assert!(json.get("data").is_some(), "GET {endpoint} missing data envelope");
        assert_eq!(json["meta"]["version"], "1");
    }
}

/// /api/v1/health reports the link state.
#[tokio::test]
async fn test_v1_health_reports_connection() {
    let (plane, mut monitor, _) = create_test_plane(test_config());

    let json = json_body(send(&plane, "GET", "/api/v1/health", None).await).await;
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["connection"], "disconnected");

    monitor.tick().await;
    let json = json_body(send(&plane, "GET", "/api/v1/health", None).await).await;
    assert_eq!(json["data"]["connection"], "connected");
}

/// /api/v1/config never leaks the automation token.
#[tokio::test]
async fn test_v1_config_omits_token() {
    let mut config = test_config();
    config.automation.token = "s3cret".to_string();
    let (plane, _, _) = create_test_plane(config);

    let resp = send(&plane, "GET", "/api/v1/config", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert!(json["data"]["automation"].get("token").is_none());
    assert!(!json.to_string().contains("s3cret"));
}

#[tokio::test]
async fn test_v1_tags_show_latest_value_and_violation() {
    let (plane, mut monitor, device) = create_test_plane(test_config());
    device.set_value(MOTOR, TagValue::Integer(1200));
    monitor.tick().await;

    let json = json_body(send(&plane, "GET", "/api/v1/tags", None).await).await;
    let tags = json["data"].as_array().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["tag"], "Motor_Speed");
    assert_eq!(tags[0]["violating"], true);

    let json = json_body(send(&plane, "GET", "/api/v1/violations", None).await).await;
    let active = json["data"].as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["observed_value"], 1200);
}

#[tokio::test]
async fn test_v1_unknown_tag_history_is_404() {
    let (plane, _, _) = create_test_plane(test_config());
    let resp = send(&plane, "GET", "/api/v1/tags/Nope/history", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_v1_events_reject_unknown_type() {
    let (plane, _, _) = create_test_plane(test_config());
    let resp = send(&plane, "GET", "/api/v1/events?type=explosion", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_v1_events_since_is_exclusive_and_ordered() {
    let (plane, mut monitor, device) = create_test_plane(test_config());
    monitor.tick().await;
    device.set_value(MOTOR, TagValue::Integer(2500));
    monitor.tick().await;

    let json = json_body(send(&plane, "GET", "/api/v1/events?since=1", None).await).await;
    let ids: Vec<u64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_u64().unwrap())
        .collect();
    assert!(!ids.is_empty());
    assert!(ids.iter().all(|id| *id > 1));
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

/// Manual trigger: 202 first, 429 while cooling down.
#[tokio::test]
async fn test_v1_trigger_then_cooldown() {
    let (plane, _, _) = create_test_plane(test_config());

    let resp = send(
        &plane,
        "POST",
        "/api/v1/remediation/stop",
        Some(r#"{"tag": "Motor_Speed"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["action"], "stop");
    let id = json["data"]["id"].as_u64().unwrap();

    let resp = send(&plane, "POST", "/api/v1/remediation/emergency_stop", None).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "COOLDOWN_ACTIVE");

    let resp = send(&plane, "GET", &format!("/api/v1/remediation/attempts/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Other actions have their own cooldown
    let resp = send(&plane, "POST", "/api/v1/remediation/gather_metrics", None).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_v1_unknown_action_and_attempt_are_404() {
    let (plane, _, _) = create_test_plane(test_config());
    let resp = send(&plane, "POST", "/api/v1/remediation/reboot", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&plane, "GET", "/api/v1/remediation/attempts/42", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_v1_chaos_controls() {
    let (plane, _, _) = create_test_plane(test_config());

    let json = json_body(send(&plane, "POST", "/api/v1/chaos/enable", None).await).await;
    assert_eq!(json["data"]["enabled"], true);

    let resp = send(&plane, "POST", "/api/v1/chaos/rate", Some(r#"{"rate": 1.5}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&plane, "POST", "/api/v1/chaos/rate", Some(r#"{"rate": 0.25}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["injection_rate"], 0.25);

    let json = json_body(send(&plane, "POST", "/api/v1/chaos/disable", None).await).await;
    assert_eq!(json["data"]["enabled"], false);
}

#[tokio::test]
async fn test_v1_chaos_inject() {
    let (plane, _, _) = create_test_plane(test_config());
    let body = r#"{"failure_type": "value_anomaly", "duration_secs": 30, "target": "Motor_Speed"}"#;

    let resp = send(&plane, "POST", "/api/v1/chaos/inject", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["failure_type"], "value_anomaly");
    assert_eq!(json["data"]["target"], "Motor_Speed");
    assert_eq!(json["data"]["active"], true);

    // Same type and target while active
    let resp = send(&plane, "POST", "/api/v1/chaos/inject", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &plane,
        "POST",
        "/api/v1/chaos/inject",
        Some(r#"{"failure_type": "value_anomaly", "target": "Nope"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(
        &plane,
        "POST",
        "/api/v1/chaos/inject",
        Some(r#"{"failure_type": "value_anomaly", "duration_secs": 600, "target": "Motor_Speed"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = json_body(send(&plane, "GET", "/api/v1/events?type=chaos_injected", None).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

/// The startup grace period only holds back random draws.
#[tokio::test]
async fn test_v1_chaos_inject_during_grace_is_accepted() {
    let mut config = test_config();
    config.chaos.startup_grace = Duration::from_secs(60);
    let (plane, _, _) = create_test_plane(config);

    let resp = send(
        &plane,
        "POST",
        "/api/v1/chaos/inject",
        Some(r#"{"failure_type": "network_timeout"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["failure_type"], "network_timeout");
    assert_eq!(json["data"]["manual"], true);
    assert_eq!(json["data"]["active"], true);

    let json = json_body(send(&plane, "GET", "/api/v1/chaos", None).await).await;
    assert!(json["data"]["grace_remaining_secs"].as_f64().unwrap() > 0.0);
    assert_eq!(json["data"]["active"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_v1_chaos_failure_types() {
    let (plane, _, _) = create_test_plane(test_config());

    let resp = send(
        &plane,
        "POST",
        "/api/v1/chaos/failure_types",
        Some(r#"{"failure_types": ["network_timeout", "connection_loss"]}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(
        json["data"]["failure_types"],
        serde_json::json!(["network_timeout", "connection_loss"])
    );
    assert!(json["data"]["failure_weights"].is_null());

    let resp = send(
        &plane,
        "POST",
        "/api/v1/chaos/failure_types",
        Some(r#"{"failure_types": []}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_v1_single_tag_detail() {
    let (plane, mut monitor, device) = create_test_plane(test_config());

    let json = json_body(send(&plane, "GET", "/api/v1/tags/Motor_Speed", None).await).await;
    assert_eq!(json["data"]["key"], "Motor_Speed");
    assert_eq!(json["data"]["device_name"], MOTOR);
    assert!(json["data"]["latest"].is_null());
    assert!(json["data"]["violation"].is_null());

    device.set_value(MOTOR, TagValue::Integer(1200));
    monitor.tick().await;
    let json = json_body(send(&plane, "GET", "/api/v1/tags/Motor_Speed", None).await).await;
    assert_eq!(json["data"]["latest"]["value"], 1200);
    assert_eq!(json["data"]["violation"]["observed_value"], 1200);
    assert_eq!(json["data"]["violation"]["active"], true);

    let resp = send(&plane, "GET", "/api/v1/tags/Nope", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
