//! Service object shared by the polling loop and the HTTP layer
//!
//! Holds the tag store, event log, chaos engine and orchestrator behind
//! cheap handles. There is no global state: everything the API can see or
//! do goes through a [`ControlPlane`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::acquisition::DeviceLink;
use crate::automation::AutomationClient;
use crate::chaos::{self, ChaosEngine, ChaosError, ChaosStatus, InjectRequest};
use crate::config::AppConfig;
use crate::monitor::{LinkStats, PollingMonitor};
use crate::remediation::{OrchestratorSettings, RemediationOrchestrator, RemediationStatus, TriggerError};
use crate::store::{EventLog, EventSubscription, TagSnapshot, TagStore};
use crate::types::{
    Event, EventType, FailureType, InjectionSnapshot, RemediationAction, RemediationAttempt,
    TagConfig, TagReading, Violation,
};

/// Event log counters for the status report.
#[derive(Debug, Clone, Serialize)]
pub struct EventLogStatus {
    pub len: usize,
    pub capacity: usize,
    pub next_id: u64,
    pub last_evicted: Option<u64>,
    pub subscribers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub link: LinkStats,
    pub tags: usize,
    pub active_violations: usize,
    pub automation_backend: &'static str,
    pub auto_remediate: bool,
    pub chaos_enabled: bool,
    pub events: EventLogStatus,
}

/// One configured tag with its current value and open violation.
#[derive(Debug, Clone, Serialize)]
pub struct TagDetail {
    #[serde(flatten)]
    pub config: TagConfig,
    pub latest: Option<TagReading>,
    pub violation: Option<Violation>,
}

#[derive(Clone)]
pub struct ControlPlane {
    config: Arc<AppConfig>,
    store: Arc<TagStore>,
    events: Arc<EventLog>,
    chaos: Arc<ChaosEngine>,
    orchestrator: RemediationOrchestrator,
    link: watch::Receiver<LinkStats>,
    automation_backend: &'static str,
    started_at: DateTime<Utc>,
}

impl ControlPlane {
    /// Wire up the core around a device link and an automation client.
    ///
    /// Returns the control plane and the polling monitor that feeds it; the
    /// caller decides where the monitor runs.
    pub fn build<L: DeviceLink>(
        config: AppConfig,
        link: L,
        client: Arc<dyn AutomationClient>,
    ) -> (Self, PollingMonitor<L>) {
        let chaos = ChaosEngine::new(&config.chaos, config.tags.clone());
        Self::build_with_chaos(config, link, client, chaos)
    }

    /// Same as [`build`](Self::build) with a caller-supplied chaos engine,
    /// e.g. a seeded one.
    pub fn build_with_chaos<L: DeviceLink>(
        config: AppConfig,
        link: L,
        client: Arc<dyn AutomationClient>,
        chaos: ChaosEngine,
    ) -> (Self, PollingMonitor<L>) {
        let config = Arc::new(config);
        let store = Arc::new(TagStore::new(
            config.tags.clone(),
            config.history.tag_history_size,
            config.history.violation_history_size,
        ));
        let events = Arc::new(EventLog::new(
            config.history.event_capacity,
            config.history.subscriber_buffer,
        ));
        let chaos = Arc::new(chaos);
        let automation_backend = client.backend_name();
        let orchestrator = RemediationOrchestrator::new(
            OrchestratorSettings::from_config(&config),
            client,
            Arc::clone(&events),
        );

        let monitor = PollingMonitor::new(
            link,
            &config,
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&chaos),
            orchestrator.clone(),
        );

        let plane = Self {
            link: monitor.stats_watch(),
            config,
            store,
            events,
            chaos,
            orchestrator,
            automation_backend,
            started_at: Utc::now(),
        };
        (plane, monitor)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn orchestrator(&self) -> &RemediationOrchestrator {
        &self.orchestrator
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn link_stats(&self) -> LinkStats {
        self.link.borrow().clone()
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            link: self.link_stats(),
            tags: self.config.tags.len(),
            active_violations: self.store.active_violations().len(),
            automation_backend: self.automation_backend,
            auto_remediate: self.config.remediation.auto_remediate,
            chaos_enabled: self.chaos.is_enabled(),
            events: EventLogStatus {
                len: self.events.len(),
                capacity: self.events.capacity(),
                next_id: self.events.next_id(),
                last_evicted: self.events.last_evicted(),
                subscribers: self.events.subscriber_count(),
            },
        }
    }

    // ========================================================================
    // Tags and violations
    // ========================================================================

    pub fn tags(&self) -> Vec<TagSnapshot> {
        self.store.snapshot()
    }

    /// `None` for an unknown tag.
    pub fn tag(&self, tag: &str) -> Option<TagDetail> {
        let config = self.store.tags().iter().find(|t| t.key == tag)?.clone();
        Some(TagDetail {
            latest: self.store.latest(tag),
            violation: self.store.active_violation(tag),
            config,
        })
    }

    /// `None` for an unknown tag.
    pub fn tag_history(&self, tag: &str, limit: usize) -> Option<Vec<TagReading>> {
        self.store.history(tag, limit)
    }

    pub fn active_violations(&self) -> Vec<Violation> {
        self.store.active_violations()
    }

    pub fn recent_violations(&self, limit: usize) -> Vec<Violation> {
        self.store.recent_violations(limit)
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn events_since(&self, after: u64, limit: usize) -> Vec<Event> {
        self.events.since(after, limit)
    }

    pub fn recent_events(&self, limit: usize, event_type: Option<EventType>) -> Vec<Event> {
        self.events.recent(limit, event_type)
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    // ========================================================================
    // Remediation
    // ========================================================================

    pub fn trigger_remediation(
        &self,
        action: RemediationAction,
        tag: Option<String>,
    ) -> Result<RemediationAttempt, TriggerError> {
        self.orchestrator.manual_trigger(action, tag)
    }

    pub fn remediation_status(&self) -> RemediationStatus {
        self.orchestrator.status()
    }

    pub fn attempt(&self, id: u64) -> Option<RemediationAttempt> {
        self.orchestrator.attempt(id)
    }

    pub fn attempts(&self, limit: usize) -> Vec<RemediationAttempt> {
        self.orchestrator.attempts(limit)
    }

    // ========================================================================
    // Chaos
    // ========================================================================

    pub fn chaos_status(&self) -> ChaosStatus {
        self.chaos.status(Instant::now())
    }

    pub fn enable_chaos(&self) -> Result<ChaosStatus, ChaosError> {
        self.chaos.enable()?;
        Ok(self.chaos_status())
    }

    /// Stops new injections. Active ones run to expiry.
    pub fn disable_chaos(&self) -> ChaosStatus {
        self.chaos.disable();
        self.chaos_status()
    }

    pub fn set_chaos_rate(&self, rate: f64) -> Result<ChaosStatus, ChaosError> {
        self.chaos.set_rate(rate)?;
        Ok(self.chaos_status())
    }

    pub fn set_chaos_failure_types(&self, types: Vec<FailureType>) -> Result<ChaosStatus, ChaosError> {
        self.chaos.set_failure_types(types)?;
        Ok(self.chaos_status())
    }

    /// Manually inject a failure. Takes effect from the next tick.
    pub fn inject_chaos(&self, req: InjectRequest) -> Result<InjectionSnapshot, ChaosError> {
        let now = Instant::now();
        let inj = self.chaos.inject(req, now)?;
        self.events.append(chaos::injected_event(&inj, now));
        Ok(inj.snapshot(now))
    }
}
