//! End-to-end scenarios
//!
//! Drive the whole core (polling monitor, tag store, event log, chaos
//! engine and orchestrator) through `ControlPlane` on a paused clock. Each
//! tick is called explicitly so the tests control exactly what the device
//! returns between reads.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plc_healer::types::{AttemptStatus, AttemptTrigger};
use plc_healer::{
    AppConfig, AutomationClient, AutomationError, ConnectionState, ControlPlane, EventType,
    FailureCondition, FailureType, JobId, JobStatus, PollingMonitor, RemediationAction,
    SimulatedAutomation, SimulatedDevice, SimulatedDeviceHandle, TagConfig, TagValue,
    TriggerError, ValueType,
};

const MOTOR: &str = "Program:MainProgram.Motor_Speed";

// ============================================================================
// Fixtures
// ============================================================================

fn motor_speed() -> TagConfig {
    TagConfig {
        key: "Motor_Speed".to_string(),
        device_name: MOTOR.to_string(),
        value_type: ValueType::Integer,
        nominal: TagValue::Integer(1750),
        condition: FailureCondition::OutsideRange {
            low: 1500.0,
            high: 2000.0,
        },
        remediation_action: RemediationAction::Reset,
    }
}

fn base_config() -> AppConfig {
    let mut config = AppConfig::with_tags(vec![motor_speed()]);
    config.remediation.cooldown_seconds = 30;
    config.remediation.max_retries = 3;
    config.automation.status_poll_interval = Duration::from_millis(200);
    config.chaos.startup_grace = Duration::ZERO;
    config
}

struct Harness {
    plane: ControlPlane,
    monitor: PollingMonitor<SimulatedDevice>,
    device: SimulatedDeviceHandle,
}

fn harness(config: AppConfig, client: Arc<dyn AutomationClient>) -> Harness {
    let device = SimulatedDevice::new("line-3-plc", &config.tags, 0.0);
    let handle = device.handle();
    let (plane, monitor) = ControlPlane::build(config, device, client);
    Harness {
        plane,
        monitor,
        device: handle,
    }
}

fn simulated() -> Arc<SimulatedAutomation> {
    Arc::new(SimulatedAutomation::new(Duration::from_secs(1), 0.0))
}

/// Fails every launch with a 400.
#[derive(Default)]
struct RejectAll {
    launches: AtomicUsize,
}

#[async_trait]
impl AutomationClient for RejectAll {
    async fn launch_job(&self, _: u64, _: serde_json::Value) -> Result<JobId, AutomationError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Err(AutomationError::Rejected {
            status: 400,
            message: "inventory unreachable".to_string(),
        })
    }

    async fn get_status(&self, _: JobId) -> Result<JobStatus, AutomationError> {
        Ok(JobStatus::Failed)
    }

    fn backend_name(&self) -> &'static str {
        "reject-all"
    }
}

fn count(plane: &ControlPlane, event_type: EventType) -> usize {
    plane.recent_events(1000, Some(event_type)).len()
}

/// Let spawned attempt tasks run to a terminal status.
async fn settle(plane: &ControlPlane, attempt_id: u64) -> plc_healer::RemediationAttempt {
    for _ in 0..1000 {
        if let Some(attempt) = plane.attempt(attempt_id) {
            if attempt.status.is_terminal() {
                return attempt;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("attempt {attempt_id} never finished");
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn out_of_range_reading_opens_and_next_good_reading_resolves() {
    let mut h = harness(base_config(), simulated());

    h.device.set_value(MOTOR, TagValue::Integer(1200));
    h.monitor.tick().await;

    let active = h.plane.active_violations();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].tag, "Motor_Speed");
    assert_eq!(active[0].observed_value, TagValue::Integer(1200));
    assert!(active[0].active);

    tokio::time::advance(Duration::from_secs(1)).await;
    h.device.set_value(MOTOR, TagValue::Integer(1750));
    h.monitor.tick().await;

    assert!(h.plane.active_violations().is_empty());
    let recent = h.plane.recent_violations(10);
    assert_eq!(recent.len(), 1);
    assert!(!recent[0].active);
    assert!(recent[0].resolved_at.is_some());
    assert_eq!(count(&h.plane, EventType::ThresholdViolation), 1);
    assert_eq!(count(&h.plane, EventType::ViolationResolved), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_remediate_off_waits_for_operator() {
    let mut config = base_config();
    config.remediation.auto_remediate = false;
    let client = simulated();
    let mut h = harness(config, client.clone());

    h.device.set_value(MOTOR, TagValue::Integer(2400));
    for _ in 0..5 {
        h.monitor.tick().await;
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    assert_eq!(h.plane.active_violations().len(), 1);
    assert!(h.plane.attempts(10).is_empty());
    assert_eq!(client.launch_count(), 0);
    assert_eq!(h.plane.remediation_status().deferred.len(), 1);

    let attempt = h
        .plane
        .trigger_remediation(RemediationAction::Reset, Some("Motor_Speed".to_string()))
        .unwrap();
    assert_eq!(
        attempt.trigger,
        AttemptTrigger::Manual {
            tag: Some("Motor_Speed".to_string())
        }
    );
    let attempt = settle(&h.plane, attempt.id).await;
    assert_eq!(attempt.status, AttemptStatus::Succeeded);
    assert_eq!(h.plane.attempts(10).len(), 1);
    assert!(h.plane.remediation_status().deferred.is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_trigger_respects_cooldown() {
    let h = harness(base_config(), simulated());
    let t0 = tokio::time::Instant::now();

    let first = h.plane.trigger_remediation(RemediationAction::Stop, None).unwrap();
    settle(&h.plane, first.id).await;
    assert!(tokio::time::Instant::now() < t0 + Duration::from_secs(10));

    tokio::time::sleep_until(t0 + Duration::from_secs(10)).await;
    let second = h.plane.trigger_remediation(RemediationAction::Stop, None);
    assert!(matches!(
        second,
        Err(TriggerError::CooldownActive {
            action: RemediationAction::Stop,
            ..
        })
    ));

    tokio::time::sleep_until(t0 + Duration::from_secs(31)).await;
    let third = h.plane.trigger_remediation(RemediationAction::Stop, None).unwrap();
    assert_ne!(third.id, first.id);
    assert_eq!(h.plane.attempts(10).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn injected_connection_loss_drops_and_restores_link() {
    let mut config = base_config();
    config.chaos.enabled = false;
    config.chaos.injection_rate = 1.0;
    config.chaos.failure_types = vec![FailureType::ConnectionLoss];
    config.chaos.connection_loss = Duration::from_secs(5);
    let mut h = harness(config, simulated());

    h.monitor.tick().await;
    assert_eq!(h.monitor.state(), ConnectionState::Connected);

    h.plane.enable_chaos().unwrap();
    h.monitor.tick().await;
    assert_eq!(h.monitor.state(), ConnectionState::Disconnected);
    assert_eq!(count(&h.plane, EventType::ChaosInjected), 1);
    assert_eq!(count(&h.plane, EventType::ConnectionLost), 1);
    let reads_at_loss = h.device.reads();

    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(1)).await;
        h.monitor.tick().await;
        assert_eq!(h.monitor.state(), ConnectionState::Disconnected);
    }
    assert_eq!(h.device.reads(), reads_at_loss, "injected loss never reaches the device");
    assert_eq!(count(&h.plane, EventType::ConnectionLost), 1);

    tokio::time::advance(Duration::from_millis(1_100)).await;
    h.monitor.tick().await;
    assert_eq!(h.monitor.state(), ConnectionState::Connected);
    assert_eq!(count(&h.plane, EventType::ChaosResolved), 1);
    // Initial connect plus the recovery
    assert_eq!(count(&h.plane, EventType::ConnectionRestored), 2);
    assert_eq!(
        h.plane.recent_events(1, None)[0].event_type,
        EventType::ConnectionRestored
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_dispatch_stops_after_max_retries() {
    let mut config = base_config();
    config.remediation.auto_remediate = true;
    let client = Arc::new(RejectAll::default());
    let mut h = harness(config, client.clone());

    h.device.set_value(MOTOR, TagValue::Integer(900));
    h.monitor.tick().await;

    let attempts = h.plane.attempts(10);
    assert_eq!(attempts.len(), 1);
    let attempt = settle(&h.plane, attempts[0].id).await;

    assert_eq!(attempt.status, AttemptStatus::Failed);
    assert_eq!(attempt.retry_count, 3);
    assert_eq!(client.launches.load(Ordering::SeqCst), 4);

    let failures = h.plane.recent_events(100, Some(EventType::RemediationFailed));
    assert_eq!(failures.len(), 4);
    let terminal: Vec<bool> = failures
        .iter()
        .map(|e| e.payload["terminal"].as_bool().unwrap_or(false))
        .collect();
    assert_eq!(terminal, vec![false, false, false, true]);

    // The violation is still open; nothing re-dispatches it
    for _ in 0..40 {
        tokio::time::advance(Duration::from_secs(1)).await;
        h.monitor.tick().await;
    }
    assert_eq!(h.plane.active_violations().len(), 1);
    assert_eq!(client.launches.load(Ordering::SeqCst), 4);
    assert_eq!(h.plane.attempts(10).len(), 1);
}
