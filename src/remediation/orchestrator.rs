//! Remediation orchestrator
//!
//! Per action: `Idle -> Triggered -> AwaitingJob -> Completed | Failed`,
//! back to `Idle` once the cooldown has elapsed.
//!
//! Triggering is synchronous and cheap (a write lock and a task spawn), so
//! the polling loop never waits on the automation platform. Each attempt is
//! driven by its own task on a [`TaskTracker`]; at most one attempt per
//! action is in flight at a time. Shutdown cancels those tasks and marks
//! their attempts `Failed` with reason "shutdown".

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{Cooldown, RemediationError, TriggerError};
use crate::automation::{AutomationClient, JobId, JobStatus};
use crate::config::AppConfig;
use crate::store::EventLog;
use crate::types::{
    ActionPhase, AttemptStatus, AttemptTrigger, EventType, NewEvent, RemediationAction,
    RemediationAttempt, Severity, TagValue, Violation,
};

// ============================================================================
// Public types
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub auto_remediate: bool,
    pub cooldown: Duration,
    pub max_retries: u32,
    pub status_poll_interval: Duration,
    pub job_timeout: Duration,
    pub job_templates: BTreeMap<RemediationAction, u64>,
}

impl OrchestratorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            auto_remediate: cfg.remediation.auto_remediate,
            cooldown: cfg.remediation.cooldown(),
            max_retries: cfg.remediation.max_retries,
            status_poll_interval: cfg.automation.status_poll_interval,
            job_timeout: cfg.automation.job_timeout,
            job_templates: cfg.automation.job_templates.clone(),
        }
    }
}

/// A violation that did not dispatch, kept until it resolves or its
/// action triggers.
#[derive(Debug, Clone, Serialize)]
pub struct DeferredViolation {
    pub violation_id: u64,
    pub tag: String,
    pub action: RemediationAction,
    pub observed_value: TagValue,
    pub deferred_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionStatus {
    pub action: RemediationAction,
    pub phase: ActionPhase,
    pub template_id: Option<u64>,
    pub cooldown_remaining_secs: f64,
    /// Seconds since this action last started an attempt.
    pub last_triggered_secs_ago: Option<f64>,
    pub in_flight: Option<u64>,
    pub last_attempt: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemediationStatus {
    pub auto_remediate: bool,
    pub cooldown_seconds: u64,
    pub max_retries: u32,
    pub actions: Vec<ActionStatus>,
    pub deferred: Vec<DeferredViolation>,
    pub total_attempts: usize,
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ActionSlot {
    phase: ActionPhase,
    in_flight: Option<u64>,
    last_attempt: Option<u64>,
}

impl Default for ActionSlot {
    fn default() -> Self {
        Self {
            phase: ActionPhase::Idle,
            in_flight: None,
            last_attempt: None,
        }
    }
}

struct State {
    attempts: BTreeMap<u64, RemediationAttempt>,
    next_attempt_id: u64,
    cooldown: Cooldown,
    slots: HashMap<RemediationAction, ActionSlot>,
    /// Keyed by tag.
    deferred: BTreeMap<String, DeferredViolation>,
    shutting_down: bool,
}

/// Everything a dispatch task needs.
struct Dispatch {
    attempt_id: u64,
    action: RemediationAction,
    template_id: u64,
    variables: serde_json::Value,
}

struct Shared {
    state: RwLock<State>,
    settings: OrchestratorSettings,
    client: Arc<dyn AutomationClient>,
    events: Arc<EventLog>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Cloneable handle; all clones share one state.
#[derive(Clone)]
pub struct RemediationOrchestrator {
    shared: Arc<Shared>,
}

impl RemediationOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        client: Arc<dyn AutomationClient>,
        events: Arc<EventLog>,
    ) -> Self {
        let cooldown = Cooldown::new(settings.cooldown);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    attempts: BTreeMap::new(),
                    next_attempt_id: 1,
                    cooldown,
                    slots: HashMap::new(),
                    deferred: BTreeMap::new(),
                    shutting_down: false,
                }),
                settings,
                client,
                events,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// React to a newly opened violation.
    ///
    /// Dispatches when auto-remediation is on and the action is neither
    /// cooling down nor in flight; otherwise the violation is deferred.
    /// Returns the new attempt id when one was started.
    pub fn on_violation(&self, violation: &Violation, action: RemediationAction) -> Option<u64> {
        let now = Instant::now();
        let started = {
            let mut st = self.shared.write();
            let outcome = if self.shared.settings.auto_remediate {
                self.begin(
                    &mut st,
                    action,
                    AttemptTrigger::Violation {
                        tag: violation.tag.clone(),
                    },
                    Some(violation.observed_value),
                    now,
                )
                .map_err(|e| e.to_string())
            } else {
                Err("auto_remediate disabled".to_string())
            };
            match outcome {
                Ok(started) => Some(started),
                Err(reason) => {
                    tracing::info!(
                        tag = %violation.tag,
                        action = %action,
                        reason = %reason,
                        "Violation recorded without dispatch"
                    );
                    st.deferred.insert(
                        violation.tag.clone(),
                        DeferredViolation {
                            violation_id: violation.id,
                            tag: violation.tag.clone(),
                            action,
                            observed_value: violation.observed_value,
                            deferred_at: Utc::now(),
                            reason,
                        },
                    );
                    None
                }
            }
        };

        started.map(|(attempt, dispatch)| self.launch(&attempt, dispatch))
    }

    /// Operator request. Subject to the same cooldown and in-flight checks
    /// as automatic triggers, regardless of `auto_remediate`.
    pub fn manual_trigger(
        &self,
        action: RemediationAction,
        tag: Option<String>,
    ) -> Result<RemediationAttempt, TriggerError> {
        let now = Instant::now();
        let (attempt, dispatch) = {
            let mut st = self.shared.write();
            self.begin(&mut st, action, AttemptTrigger::Manual { tag }, None, now)
                .inspect_err(|e| {
                    tracing::warn!(action = %action, error = %e, "Manual remediation rejected");
                })?
        };
        self.launch(&attempt, dispatch);
        Ok(attempt)
    }

    /// Per-tick housekeeping with the currently active violations: drop
    /// deferred entries whose violation resolved and, with auto-remediation
    /// on, dispatch deferred ones whose action is available again.
    pub fn reconcile(&self, active: &[Violation]) {
        let now = Instant::now();
        let mut started = Vec::new();
        {
            let mut st = self.shared.write();
            st.deferred.retain(|tag, d| {
                let keep = active.iter().any(|v| &v.tag == tag && v.id == d.violation_id);
                if !keep {
                    tracing::debug!(tag = %tag, action = %d.action, "Deferred violation resolved before dispatch");
                }
                keep
            });

            if !self.shared.settings.auto_remediate || st.shutting_down {
                return;
            }

            let candidates: Vec<DeferredViolation> = st.deferred.values().cloned().collect();
            for d in candidates {
                if !st.deferred.contains_key(&d.tag) {
                    continue;
                }
                if let Ok(s) = self.begin(
                    &mut st,
                    d.action,
                    AttemptTrigger::Violation { tag: d.tag.clone() },
                    Some(d.observed_value),
                    now,
                ) {
                    started.push(s);
                }
            }
        }

        for (attempt, dispatch) in started {
            self.launch(&attempt, dispatch);
        }
    }

    /// Checks and bookkeeping for a new attempt. Caller holds the write lock.
    fn begin(
        &self,
        st: &mut State,
        action: RemediationAction,
        trigger: AttemptTrigger,
        observed: Option<TagValue>,
        now: Instant,
    ) -> Result<(RemediationAttempt, Dispatch), TriggerError> {
        if st.shutting_down {
            return Err(TriggerError::ShuttingDown);
        }
        let template_id = *self
            .shared
            .settings
            .job_templates
            .get(&action)
            .ok_or(TriggerError::TemplateMissing(action))?;

        let remaining = st.cooldown.remaining(action, now);
        if !remaining.is_zero() {
            return Err(TriggerError::CooldownActive {
                action,
                remaining_secs: remaining.as_secs_f64(),
            });
        }
        if let Some(attempt_id) = st.slots.get(&action).and_then(|s| s.in_flight) {
            return Err(TriggerError::InFlight { action, attempt_id });
        }

        let id = st.next_attempt_id;
        st.next_attempt_id += 1;
        st.cooldown.record(action, now);

        let triggered_by = match &trigger {
            AttemptTrigger::Violation { .. } => "violation",
            AttemptTrigger::Manual { .. } => "manual",
        };
        let variables = json!({
            "action": action,
            "tag_name": trigger.tag(),
            "observed_value": observed,
            "triggered_by": triggered_by,
            "attempt_id": id,
        });

        let attempt = RemediationAttempt {
            id,
            action,
            trigger,
            triggered_at: Utc::now(),
            job_id: None,
            status: AttemptStatus::Pending,
            retry_count: 0,
            last_error: None,
            finished_at: None,
        };
        st.attempts.insert(id, attempt.clone());
        let slot = st.slots.entry(action).or_default();
        slot.phase = ActionPhase::Triggered;
        slot.in_flight = Some(id);
        slot.last_attempt = Some(id);
        st.deferred.retain(|_, d| d.action != action);

        Ok((
            attempt,
            Dispatch {
                attempt_id: id,
                action,
                template_id,
                variables,
            },
        ))
    }

    /// Emit `remediation_triggered` and hand the attempt to its task.
    fn launch(&self, attempt: &RemediationAttempt, dispatch: Dispatch) -> u64 {
        tracing::info!(
            attempt_id = attempt.id,
            action = %attempt.action,
            template_id = dispatch.template_id,
            tag = attempt.trigger.tag().unwrap_or(""),
            "Remediation triggered"
        );
        self.shared.emit(
            NewEvent::new(
                EventType::RemediationTriggered,
                json!({
                    "attempt_id": attempt.id,
                    "action": attempt.action,
                    "template_id": dispatch.template_id,
                    "trigger": attempt.trigger,
                }),
            ),
            attempt.trigger.tag(),
        );
        let shared = Arc::clone(&self.shared);
        self.shared.tracker.spawn(run_attempt(shared, dispatch));
        attempt.id
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn attempt(&self, id: u64) -> Option<RemediationAttempt> {
        let st = self.shared.read();
        st.attempts.get(&id).cloned()
    }

    /// Newest first.
    pub fn attempts(&self, limit: usize) -> Vec<RemediationAttempt> {
        let st = self.shared.read();
        st.attempts.values().rev().take(limit).cloned().collect()
    }

    pub fn deferred(&self) -> Vec<DeferredViolation> {
        self.shared.read().deferred.values().cloned().collect()
    }

    pub fn action_phase(&self, action: RemediationAction) -> ActionPhase {
        let st = self.shared.read();
        Self::phase_of(&st, action, Instant::now())
    }

    fn phase_of(st: &State, action: RemediationAction, now: Instant) -> ActionPhase {
        let slot = st.slots.get(&action).copied().unwrap_or_default();
        if slot.in_flight.is_none() && st.cooldown.is_ready(action, now) {
            ActionPhase::Idle
        } else {
            slot.phase
        }
    }

    pub fn status(&self) -> RemediationStatus {
        let now = Instant::now();
        let st = self.shared.read();
        let actions = RemediationAction::ALL
            .into_iter()
            .map(|action| {
                let slot = st.slots.get(&action).copied().unwrap_or_default();
                ActionStatus {
                    action,
                    phase: Self::phase_of(&st, action, now),
                    template_id: self.shared.settings.job_templates.get(&action).copied(),
                    cooldown_remaining_secs: st.cooldown.remaining(action, now).as_secs_f64(),
                    last_triggered_secs_ago: st
                        .cooldown
                        .last_triggered(action)
                        .map(|at| now.saturating_duration_since(at).as_secs_f64()),
                    in_flight: slot.in_flight,
                    last_attempt: slot.last_attempt,
                }
            })
            .collect();
        RemediationStatus {
            auto_remediate: self.shared.settings.auto_remediate,
            cooldown_seconds: st.cooldown.window().as_secs(),
            max_retries: self.shared.settings.max_retries,
            actions,
            deferred: st.deferred.values().cloned().collect(),
            total_attempts: st.attempts.len(),
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Cancel outstanding dispatch/status tasks and wait for them. Every
    /// attempt still in flight ends `Failed` with reason "shutdown".
    pub async fn shutdown(&self) {
        self.shared.write().shutting_down = true;
        self.shared.cancel.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        // Attempts whose task never got to observe the cancellation
        let stuck: Vec<u64> = {
            let st = self.shared.read();
            st.attempts
                .values()
                .filter(|a| !a.status.is_terminal())
                .map(|a| a.id)
                .collect()
        };
        for id in stuck {
            self.shared.finish_failed(id, &RemediationError::Shutdown);
        }
        tracing::info!("Remediation orchestrator stopped");
    }
}

// ============================================================================
// Dispatch task
// ============================================================================

async fn run_attempt(shared: Arc<Shared>, dispatch: Dispatch) {
    tracing::debug!(attempt_id = dispatch.attempt_id, action = %dispatch.action, "Dispatch task started");
    loop {
        match dispatch_once(&shared, &dispatch).await {
            Ok(job) => {
                shared.finish_succeeded(dispatch.attempt_id, job);
                return;
            }
            Err(RemediationError::Shutdown) => {
                shared.finish_failed(dispatch.attempt_id, &RemediationError::Shutdown);
                return;
            }
            Err(e) => {
                if !shared.record_failure(dispatch.attempt_id, &e) {
                    return;
                }
            }
        }
    }
}

/// Launch once and follow the job to a terminal status.
async fn dispatch_once(shared: &Shared, d: &Dispatch) -> Result<JobId, RemediationError> {
    let job = tokio::select! {
        biased;
        () = shared.cancel.cancelled() => return Err(RemediationError::Shutdown),
        r = shared.client.launch_job(d.template_id, d.variables.clone()) => r?,
    };
    shared.mark_running(d.attempt_id, job);

    let deadline = Instant::now() + shared.settings.job_timeout;
    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return Err(RemediationError::Shutdown),
            () = tokio::time::sleep(shared.settings.status_poll_interval) => {}
        }
        let status = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return Err(RemediationError::Shutdown),
            r = shared.client.get_status(job) => r,
        };
        match status {
            Ok(JobStatus::Succeeded) => return Ok(job),
            Ok(JobStatus::Failed) => {
                return Err(RemediationError::JobFailed {
                    job,
                    reason: "platform reported failure".to_string(),
                })
            }
            Ok(JobStatus::Pending | JobStatus::Running) => {}
            // Status lookups are retried until the job deadline
            Err(e) => {
                tracing::warn!(attempt_id = d.attempt_id, job_id = %job, error = %e, "Job status poll failed");
            }
        }
        if Instant::now() >= deadline {
            return Err(RemediationError::JobFailed {
                job,
                reason: format!(
                    "no terminal status within {}s",
                    shared.settings.job_timeout.as_secs()
                ),
            });
        }
    }
}

impl Shared {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: NewEvent, tag: Option<&str>) {
        let event = match tag {
            Some(t) => event.with_tag(t),
            None => event,
        };
        self.events.append(event);
    }

    fn mark_running(&self, attempt_id: u64, job: JobId) {
        let mut st = self.write();
        let Some(att) = st.attempts.get_mut(&attempt_id) else {
            return;
        };
        att.job_id = Some(job);
        att.status = AttemptStatus::Running;
        let action = att.action;
        st.slots.entry(action).or_default().phase = ActionPhase::AwaitingJob;
        tracing::info!(attempt_id, job_id = %job, action = %action, "Remediation job launched");
    }

    fn finish_succeeded(&self, attempt_id: u64, job: JobId) {
        let attempt = {
            let mut st = self.write();
            let Some(att) = st.attempts.get_mut(&attempt_id) else {
                return;
            };
            att.status = AttemptStatus::Succeeded;
            att.finished_at = Some(Utc::now());
            let att = att.clone();
            let slot = st.slots.entry(att.action).or_default();
            slot.phase = ActionPhase::Completed;
            slot.in_flight = None;
            att
        };
        tracing::info!(
            attempt_id,
            job_id = %job,
            action = %attempt.action,
            retry_count = attempt.retry_count,
            "Remediation completed"
        );
        self.emit(
            NewEvent::new(
                EventType::RemediationCompleted,
                json!({
                    "attempt_id": attempt_id,
                    "action": attempt.action,
                    "job_id": job,
                    "retry_count": attempt.retry_count,
                }),
            ),
            attempt.trigger.tag(),
        );
    }

    /// Record a failed dispatch or job. Returns `true` when the attempt
    /// should be retried immediately.
    fn record_failure(&self, attempt_id: u64, err: &RemediationError) -> bool {
        let (retry, attempt) = {
            let mut st = self.write();
            let shutting_down = st.shutting_down;
            let Some(att) = st.attempts.get_mut(&attempt_id) else {
                return false;
            };
            att.last_error = Some(err.to_string());
            let retry = att.retry_count < self.settings.max_retries && !shutting_down;
            if retry {
                att.retry_count += 1;
                att.status = AttemptStatus::Pending;
                att.job_id = None;
            } else {
                att.status = AttemptStatus::Failed;
                att.finished_at = Some(Utc::now());
            }
            let att = att.clone();
            let slot = st.slots.entry(att.action).or_default();
            if retry {
                slot.phase = ActionPhase::Triggered;
            } else {
                slot.phase = ActionPhase::Failed;
                slot.in_flight = None;
            }
            (retry, att)
        };

        if retry {
            tracing::warn!(
                attempt_id,
                action = %attempt.action,
                retry = attempt.retry_count,
                max_retries = self.settings.max_retries,
                error = %err,
                "Remediation failed, retrying"
            );
        } else {
            tracing::error!(
                attempt_id,
                action = %attempt.action,
                retry_count = attempt.retry_count,
                error = %err,
                "Remediation failed permanently"
            );
        }
        self.emit_failed(&attempt, err, !retry);
        retry
    }

    /// Terminal failure without retry (shutdown).
    fn finish_failed(&self, attempt_id: u64, err: &RemediationError) {
        let attempt = {
            let mut st = self.write();
            let Some(att) = st.attempts.get_mut(&attempt_id) else {
                return;
            };
            if att.status.is_terminal() {
                return;
            }
            att.status = AttemptStatus::Failed;
            att.last_error = Some(err.to_string());
            att.finished_at = Some(Utc::now());
            let att = att.clone();
            let slot = st.slots.entry(att.action).or_default();
            slot.phase = ActionPhase::Failed;
            slot.in_flight = None;
            att
        };
        tracing::warn!(attempt_id, action = %attempt.action, error = %err, "Remediation attempt abandoned");
        self.emit_failed(&attempt, err, true);
    }

    fn emit_failed(&self, attempt: &RemediationAttempt, err: &RemediationError, terminal: bool) {
        let severity = if terminal { Severity::Error } else { Severity::Warning };
        self.emit(
            NewEvent::new(
                EventType::RemediationFailed,
                json!({
                    "attempt_id": attempt.id,
                    "action": attempt.action,
                    "error_kind": err.kind(),
                    "error": err.to_string(),
                    "retry_count": attempt.retry_count,
                    "max_retries": self.settings.max_retries,
                    "terminal": terminal,
                }),
            )
            .with_severity(severity),
            attempt.trigger.tag(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{AutomationError, SimulatedAutomation};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects every launch and counts the calls.
    struct RejectingClient {
        launches: AtomicUsize,
    }

    #[async_trait]
    impl AutomationClient for RejectingClient {
        async fn launch_job(&self, _: u64, _: serde_json::Value) -> Result<JobId, AutomationError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Err(AutomationError::Rejected {
                status: 400,
                message: "template disabled".to_string(),
            })
        }

        async fn get_status(&self, _: JobId) -> Result<JobStatus, AutomationError> {
            Ok(JobStatus::Failed)
        }

        fn backend_name(&self) -> &'static str {
            "rejecting"
        }
    }

    /// Accepts launches but never finishes a job.
    struct HangingClient;

    #[async_trait]
    impl AutomationClient for HangingClient {
        async fn launch_job(&self, _: u64, _: serde_json::Value) -> Result<JobId, AutomationError> {
            Ok(JobId(1))
        }

        async fn get_status(&self, _: JobId) -> Result<JobStatus, AutomationError> {
            Ok(JobStatus::Running)
        }

        fn backend_name(&self) -> &'static str {
            "hanging"
        }
    }

    fn settings(auto: bool) -> OrchestratorSettings {
        OrchestratorSettings {
            auto_remediate: auto,
            cooldown: Duration::from_secs(30),
            max_retries: 3,
            status_poll_interval: Duration::from_millis(100),
            job_timeout: Duration::from_secs(3600),
            job_templates: RemediationAction::ALL.into_iter().zip(1..).collect(),
        }
    }

    fn violation(tag: &str) -> Violation {
        Violation {
            id: 1,
            tag: tag.to_string(),
            condition: "outside_range".to_string(),
            condition_detail: "outside_range [1500, 2000]".to_string(),
            observed_value: TagValue::Integer(1200),
            nominal: TagValue::Integer(1750),
            started_at: Utc::now(),
            resolved_at: None,
            active: true,
        }
    }

    async fn wait_terminal(orch: &RemediationOrchestrator, id: u64) -> RemediationAttempt {
        loop {
            if let Some(a) = orch.attempt(id) {
                if a.status.is_terminal() {
                    return a;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_dispatch_retries_then_fails() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(RejectingClient {
            launches: AtomicUsize::new(0),
        });
        let orch = RemediationOrchestrator::new(settings(true), client.clone(), events.clone());

        let id = orch.on_violation(&violation("Motor_Speed"), RemediationAction::Reset).unwrap();
        let attempt = wait_terminal(&orch, id).await;

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.retry_count, 3);
        assert_eq!(client.launches.load(Ordering::SeqCst), 4);

        let failed = events.recent(10, Some(EventType::RemediationFailed));
        assert_eq!(failed.len(), 4);
        let terminal: Vec<bool> = failed.iter().map(|e| e.payload["terminal"] == true).collect();
        assert_eq!(terminal, vec![false, false, false, true]);

        // no further automatic retries
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.launches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_job_completes() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_secs(1), 0.0));
        let orch = RemediationOrchestrator::new(settings(false), client, events.clone());

        let attempt = orch.manual_trigger(RemediationAction::Restart, None).unwrap();
        let done = wait_terminal(&orch, attempt.id).await;
        assert_eq!(done.status, AttemptStatus::Succeeded);
        assert!(done.job_id.is_some());
        assert_eq!(events.recent(10, Some(EventType::RemediationCompleted)).len(), 1);
        assert_eq!(orch.action_phase(RemediationAction::Restart), ActionPhase::Completed);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(orch.action_phase(RemediationAction::Restart), ActionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_off_defers_until_manual_trigger() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_secs(1), 0.0));
        let orch = RemediationOrchestrator::new(settings(false), client, events);

        assert!(orch.on_violation(&violation("Motor_Speed"), RemediationAction::Reset).is_none());
        assert!(orch.attempts(10).is_empty());
        assert_eq!(orch.deferred().len(), 1);

        orch.manual_trigger(RemediationAction::Reset, Some("Motor_Speed".to_string()))
            .unwrap();
        assert_eq!(orch.attempts(10).len(), 1);
        assert!(orch.deferred().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_cooldown_per_action() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_secs(1), 0.0));
        let orch = RemediationOrchestrator::new(settings(false), client, events);

        orch.manual_trigger(RemediationAction::Stop, None).unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let status = orch.status();
        assert_eq!(status.cooldown_seconds, 30);
        let stop = status
            .actions
            .iter()
            .find(|a| a.action == RemediationAction::Stop)
            .unwrap();
        assert_eq!(stop.last_triggered_secs_ago, Some(10.0));
        assert_eq!(stop.cooldown_remaining_secs, 20.0);
        let reset = status
            .actions
            .iter()
            .find(|a| a.action == RemediationAction::Reset)
            .unwrap();
        assert!(reset.last_triggered_secs_ago.is_none());
        assert_eq!(reset.cooldown_remaining_secs, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_is_shared_per_action() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_millis(10), 0.0));
        let orch = RemediationOrchestrator::new(settings(true), client, events);

        let a = orch.on_violation(&violation("Pump_A"), RemediationAction::Reset);
        let mut other = violation("Pump_B");
        other.id = 2;
        let b = orch.on_violation(&other, RemediationAction::Reset);
        assert!(a.is_some());
        assert!(b.is_none(), "second tag shares the reset cooldown");
        assert_eq!(orch.deferred()[0].tag, "Pump_B");

        // different action is unaffected
        let mut third = violation("Valve");
        third.id = 3;
        assert!(orch.on_violation(&third, RemediationAction::Stop).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_violation_dispatches_after_cooldown() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_millis(10), 0.0));
        let orch = RemediationOrchestrator::new(settings(true), client, events);

        orch.manual_trigger(RemediationAction::Reset, None).unwrap();
        let v = violation("Motor_Speed");
        assert!(orch.on_violation(&v, RemediationAction::Reset).is_none());

        orch.reconcile(std::slice::from_ref(&v));
        assert_eq!(orch.attempts(10).len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        orch.reconcile(std::slice::from_ref(&v));
        assert_eq!(orch.attempts(10).len(), 2);
        assert!(orch.deferred().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_violation_is_not_dispatched_later() {
        let events = Arc::new(EventLog::new(100, 16));
        let client = Arc::new(SimulatedAutomation::new(Duration::from_millis(10), 0.0));
        let orch = RemediationOrchestrator::new(settings(false), client, events);

        orch.on_violation(&violation("Motor_Speed"), RemediationAction::Reset);
        orch.reconcile(&[]);
        assert!(orch.deferred().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_attempt_blocks_same_action() {
        let events = Arc::new(EventLog::new(100, 16));
        let mut s = settings(false);
        s.cooldown = Duration::ZERO;
        let orch = RemediationOrchestrator::new(s, Arc::new(HangingClient), events);

        let first = orch.manual_trigger(RemediationAction::Stop, None).unwrap();
        let err = orch.manual_trigger(RemediationAction::Stop, None).unwrap_err();
        assert_eq!(
            err,
            TriggerError::InFlight {
                action: RemediationAction::Stop,
                attempt_id: first.id
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_marks_in_flight_attempt_failed() {
        let events = Arc::new(EventLog::new(100, 16));
        let orch = RemediationOrchestrator::new(settings(false), Arc::new(HangingClient), events.clone());

        let attempt = orch.manual_trigger(RemediationAction::Stop, None).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(orch.attempt(attempt.id).unwrap().status, AttemptStatus::Running);

        orch.shutdown().await;
        let after = orch.attempt(attempt.id).unwrap();
        assert_eq!(after.status, AttemptStatus::Failed);
        assert_eq!(after.last_error.as_deref(), Some("shutdown"));
        assert_eq!(
            orch.manual_trigger(RemediationAction::Reset, None).unwrap_err(),
            TriggerError::ShuttingDown
        );
        let last = events.recent(1, Some(EventType::RemediationFailed));
        assert_eq!(last[0].payload["error_kind"], "shutdown");
    }

    #[tokio::test]
    async fn missing_template_is_rejected() {
        let events = Arc::new(EventLog::new(100, 16));
        let mut s = settings(false);
        s.job_templates.remove(&RemediationAction::GatherMetrics);
        let orch = RemediationOrchestrator::new(s, Arc::new(HangingClient), events);
        assert_eq!(
            orch.manual_trigger(RemediationAction::GatherMetrics, None).unwrap_err(),
            TriggerError::TemplateMissing(RemediationAction::GatherMetrics)
        );
    }
}
