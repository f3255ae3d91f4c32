//! Polling monitor
//!
//! The heartbeat of the system. One tick:
//!
//! ```text
//! chaos expiry / draw -> link read (or injected fault) -> chaos transform
//!   -> tag store + evaluation -> violation events -> orchestrator
//! ```
//!
//! Reads are never retried within a tick and there is no backoff: a failed
//! device is polled again at the normal interval.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::evaluate;
use crate::acquisition::{DeviceLink, LinkError};
use crate::chaos::{self, ChaosEngine};
use crate::config::AppConfig;
use crate::remediation::RemediationOrchestrator;
use crate::store::{tag_store::reading_now, EventLog, TagStore};
use crate::types::{EventType, FailureType, NewEvent, Provenance, Severity, TagConfig, TagValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Link health as published to readers.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStats {
    pub device: String,
    pub state: ConnectionState,
    pub ticks: u64,
    pub total_reads: u64,
    pub total_errors: u64,
    pub consecutive_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl LinkStats {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            state: ConnectionState::Disconnected,
            ticks: 0,
            total_reads: 0,
            total_errors: 0,
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
        }
    }
}

pub struct PollingMonitor<L: DeviceLink> {
    link: L,
    tags: Vec<TagConfig>,
    /// Device-side names, in `tags` order.
    device_names: Vec<String>,
    poll_interval: Duration,
    read_timeout: Duration,
    store: Arc<TagStore>,
    events: Arc<EventLog>,
    chaos: Arc<ChaosEngine>,
    orchestrator: RemediationOrchestrator,
    stats: LinkStats,
    stats_tx: watch::Sender<LinkStats>,
}

impl<L: DeviceLink> PollingMonitor<L> {
    pub fn new(
        link: L,
        config: &AppConfig,
        store: Arc<TagStore>,
        events: Arc<EventLog>,
        chaos: Arc<ChaosEngine>,
        orchestrator: RemediationOrchestrator,
    ) -> Self {
        let stats = LinkStats::new(&config.device.name);
        let (stats_tx, _) = watch::channel(stats.clone());
        Self {
            link,
            tags: config.tags.clone(),
            device_names: config.tags.iter().map(|t| t.device_name.clone()).collect(),
            poll_interval: config.device.poll_interval(),
            read_timeout: config.device.read_timeout(),
            store,
            events,
            chaos,
            orchestrator,
            stats,
            stats_tx,
        }
    }

    /// Receiver for link statistics, updated at the end of every tick.
    pub fn stats_watch(&self) -> watch::Receiver<LinkStats> {
        self.stats_tx.subscribe()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn state(&self) -> ConnectionState {
        self.stats.state
    }

    /// Tick at the configured interval until `cancel` fires. A tick in
    /// progress always completes. On exit the link is closed and the
    /// orchestrator's outstanding work is cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            device = %self.link.link_name(),
            tags = self.tags.len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Polling monitor started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Polling monitor shutdown signal received");
                    break;
                }
                _ = interval.tick() => self.tick().await,
            }
        }

        self.link.close().await;
        self.orchestrator.shutdown().await;
        info!(ticks = self.stats.ticks, errors = self.stats.total_errors, "Polling monitor stopped");
    }

    /// Run one poll tick.
    pub async fn tick(&mut self) {
        let now = Instant::now();
        self.stats.ticks += 1;

        for inj in self.chaos.expire(now) {
            self.events.append(chaos::resolved_event(&inj, now));
        }
        if let Some(inj) = self.chaos.maybe_inject(now) {
            if inj.failure_type == FailureType::ServiceCrash {
                warn!(injection_id = inj.id, "service_crash injected; process keeps running");
            }
            self.events.append(chaos::injected_event(&inj, now));
        }

        if self.stats.state == ConnectionState::Disconnected {
            self.stats.state = ConnectionState::Connecting;
        }

        let result = match self.chaos.link_fault(now) {
            Some(fault) => Err(fault),
            None => self.read_all().await,
        };
        self.stats.total_reads += 1;

        match result {
            Ok(values) => self.on_success(values, Instant::now()),
            Err(e) => self.on_failure(&e),
        }

        self.orchestrator.reconcile(&self.store.active_violations());
        self.stats_tx.send_replace(self.stats.clone());
    }

    /// Read every configured tag, bounded by the read timeout. Values are
    /// returned keyed by tag key and coerced to the declared type.
    async fn read_all(&mut self) -> Result<HashMap<String, TagValue>, LinkError> {
        let raw = tokio::time::timeout(self.read_timeout, self.link.read(&self.device_names))
            .await
            .map_err(|_| LinkError::Timeout)??;

        let mut values = HashMap::with_capacity(self.tags.len());
        for tag in &self.tags {
            let value = raw.get(&tag.device_name).ok_or_else(|| {
                LinkError::Protocol(format!("tag '{}' missing from read", tag.device_name))
            })?;
            let coerced = value.coerce(tag.value_type).ok_or_else(|| {
                LinkError::Protocol(format!(
                    "tag '{}' returned {} which is not a {}",
                    tag.device_name, value, tag.value_type
                ))
            })?;
            values.insert(tag.key.clone(), coerced);
        }
        Ok(values)
    }

    fn on_success(&mut self, mut values: HashMap<String, TagValue>, now: Instant) {
        if self.stats.state != ConnectionState::Connected {
            info!(
                device = %self.link.link_name(),
                after_failures = self.stats.consecutive_failures,
                "Device connection established"
            );
            self.events.append(NewEvent::new(
                EventType::ConnectionRestored,
                json!({
                    "device": self.stats.device,
                    "after_failures": self.stats.consecutive_failures,
                }),
            ));
        }
        self.stats.state = ConnectionState::Connected;
        self.stats.consecutive_failures = 0;
        self.stats.last_success = Some(Utc::now());

        let injected = self.chaos.transform(&mut values, now);

        let samples = self.tags.iter().filter_map(|tag| {
            let value = *values.get(&tag.key)?;
            let provenance = if injected.contains(&tag.key) {
                Provenance::ChaosInjected
            } else {
                Provenance::Real
            };
            Some((tag, reading_now(&tag.key, value, provenance), evaluate(tag, &value)))
        });
        let changes = self.store.record_tick(samples);

        for v in &changes.opened {
            warn!(
                tag = %v.tag,
                value = %v.observed_value,
                condition = %v.condition_detail,
                "Threshold violation"
            );
            self.events.append(
                NewEvent::new(
                    EventType::ThresholdViolation,
                    json!({
                        "violation_id": v.id,
                        "value": v.observed_value,
                        "nominal": v.nominal,
                        "condition": v.condition,
                        "condition_detail": v.condition_detail,
                        "chaos_injected": injected.contains(&v.tag),
                    }),
                )
                .with_tag(v.tag.as_str()),
            );
            if let Some(tag) = self.tags.iter().find(|t| t.key == v.tag) {
                self.orchestrator.on_violation(v, tag.remediation_action);
            }
        }

        for v in &changes.resolved {
            info!(tag = %v.tag, violation_id = v.id, "Violation resolved");
            let duration_secs = v
                .resolved_at
                .map(|end| (end - v.started_at).num_milliseconds() as f64 / 1000.0);
            self.events.append(
                NewEvent::new(
                    EventType::ViolationResolved,
                    json!({
                        "violation_id": v.id,
                        "duration_secs": duration_secs,
                        "value": values.get(&v.tag),
                    }),
                )
                .with_tag(v.tag.as_str()),
            );
        }
    }

    fn on_failure(&mut self, err: &LinkError) {
        self.stats.total_errors += 1;
        self.stats.consecutive_failures += 1;
        self.stats.last_error = Some(err.to_string());

        if self.stats.state == ConnectionState::Connected {
            warn!(device = %self.link.link_name(), error = %err, "Device connection lost");
            self.events.append(
                NewEvent::new(
                    EventType::ConnectionLost,
                    json!({
                        "device": self.stats.device,
                        "error_kind": err.kind(),
                        "error": err.to_string(),
                    }),
                )
                .with_severity(Severity::Error),
            );
        } else {
            debug!(
                device = %self.link.link_name(),
                error = %err,
                consecutive_failures = self.stats.consecutive_failures,
                "Device still unreachable"
            );
        }
        self.stats.state = ConnectionState::Disconnected;
    }
}
