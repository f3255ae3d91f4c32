//! Chaos engine: probability draw, expiry, link faults and value transforms
//!
//! All methods are synchronous and cheap; the polling loop calls them inline
//! once per tick. Time is passed in explicitly as a `tokio::time::Instant`
//! so tests can run on a paused clock.

use chrono::Utc;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::ChaosError;
use crate::acquisition::LinkError;
use crate::config::{defaults, ChaosSettings};
use crate::types::{ChaosInjection, FailureType, InjectionSnapshot, TagConfig, TagValue};

/// Operator request to inject a specific failure.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct InjectRequest {
    pub failure_type: Option<FailureType>,
    /// Seconds. Value anomalies accept 1..=180; omitted means random
    /// (value anomaly) or the configured constant (link faults).
    pub duration_secs: Option<u64>,
    /// Tag key for value anomalies; random tag when omitted.
    pub target: Option<String>,
}

/// Serializable chaos engine report.
#[derive(Debug, Clone, Serialize)]
pub struct ChaosStatus {
    pub enabled: bool,
    pub injection_rate: f64,
    pub failure_types: Vec<FailureType>,
    pub failure_weights: Option<Vec<f64>>,
    pub active: Vec<InjectionSnapshot>,
    pub recent: Vec<InjectionSnapshot>,
    pub total_injections: u64,
    pub grace_remaining_secs: f64,
}

type RearmKey = (FailureType, Option<String>);

struct State {
    enabled: bool,
    rate: f64,
    failure_types: Vec<FailureType>,
    weights: Option<Vec<f64>>,
    sampler: Option<WeightedIndex<f64>>,
    active: Vec<ChaosInjection>,
    /// Last injections (active or not), oldest first.
    history: VecDeque<ChaosInjection>,
    /// Earliest instant a random draw may re-inject this type/target.
    rearm_until: HashMap<RearmKey, Instant>,
    next_id: u64,
    total: u64,
    rng: StdRng,
}

pub struct ChaosEngine {
    state: Mutex<State>,
    tags: Vec<TagConfig>,
    network_timeout: Duration,
    connection_loss: Duration,
    grace_until: Instant,
    rearm: Duration,
}

impl ChaosEngine {
    pub fn new(settings: &ChaosSettings, tags: Vec<TagConfig>) -> Self {
        let sampler = settings
            .failure_weights
            .as_ref()
            .and_then(|w| WeightedIndex::new(w.iter().copied()).ok());
        Self {
            state: Mutex::new(State {
                enabled: settings.enabled,
                rate: settings.injection_rate,
                failure_types: settings.failure_types.clone(),
                weights: settings.failure_weights.clone(),
                sampler,
                active: Vec::new(),
                history: VecDeque::new(),
                rearm_until: HashMap::new(),
                next_id: 1,
                total: 0,
                rng: StdRng::from_entropy(),
            }),
            tags,
            network_timeout: settings.network_timeout,
            connection_loss: settings.connection_loss,
            grace_until: Instant::now() + settings.startup_grace,
            rearm: settings.rearm,
        }
    }

    /// Deterministic draws for tests.
    pub fn with_seed(self, seed: u64) -> Self {
        self.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn grace_remaining(&self, now: Instant) -> Duration {
        self.grace_until.saturating_duration_since(now)
    }

    // ========================================================================
    // Per-tick operations
    // ========================================================================

    /// Remove injections whose time is up. Returns them for `chaos_resolved`.
    pub fn expire(&self, now: Instant) -> Vec<ChaosInjection> {
        let mut guard = self.lock();
        let st = &mut *guard;
        let (expired, still): (Vec<_>, Vec<_>) =
            st.active.drain(..).partition(|inj| !inj.is_active(now));
        st.active = still;
        for inj in &expired {
            st.rearm_until
                .insert((inj.failure_type, inj.target.clone()), now + self.rearm);
        }
        st.rearm_until.retain(|_, until| *until > now);
        expired
    }

    /// The once-per-tick probability draw. Returns the new injection, if any.
    pub fn maybe_inject(&self, now: Instant) -> Option<ChaosInjection> {
        if !self.grace_remaining(now).is_zero() {
            return None;
        }
        let mut guard = self.lock();
        let st = &mut *guard;
        if !st.enabled || st.failure_types.is_empty() {
            return None;
        }
        let draw: f64 = st.rng.gen();
        if draw >= st.rate {
            return None;
        }

        let idx = match &st.sampler {
            Some(sampler) => sampler.sample(&mut st.rng),
            None => st.rng.gen_range(0..st.failure_types.len()),
        };
        let failure_type = *st.failure_types.get(idx)?;

        if st
            .active
            .iter()
            .any(|inj| inj.failure_type == failure_type && inj.is_active(now))
        {
            return None;
        }

        let target = if failure_type.is_tag_scoped() {
            if self.tags.is_empty() {
                return None;
            }
            let i = st.rng.gen_range(0..self.tags.len());
            Some(self.tags[i].key.clone())
        } else {
            None
        };

        if st
            .rearm_until
            .get(&(failure_type, target.clone()))
            .is_some_and(|until| *until > now)
        {
            tracing::debug!(failure_type = %failure_type, target = ?target, "Chaos draw suppressed by re-arm window");
            return None;
        }

        let duration = self.duration_for(st, failure_type, None);
        Some(self.activate(st, failure_type, duration, target, false, now))
    }

    /// Fault the link should report this tick, if any. Connection loss wins
    /// over a timeout when both are active.
    pub fn link_fault(&self, now: Instant) -> Option<LinkError> {
        let st = self.lock();
        let active = |t: FailureType| {
            st.active
                .iter()
                .any(|inj| inj.failure_type == t && inj.is_active(now))
        };
        if active(FailureType::ConnectionLoss) {
            Some(LinkError::ConnectionLost("injected connection loss".to_string()))
        } else if active(FailureType::NetworkTimeout) {
            Some(LinkError::Timeout)
        } else {
            None
        }
    }

    /// Replace values of tags under an active value anomaly.
    ///
    /// `values` is keyed by tag key. Returns the keys that were replaced.
    pub fn transform(&self, values: &mut HashMap<String, TagValue>, now: Instant) -> Vec<String> {
        let st = self.lock();
        let mut replaced = Vec::new();
        for inj in st.active.iter().filter(|i| {
            i.failure_type == FailureType::ValueAnomaly && i.is_active(now)
        }) {
            let (Some(target), Some(value)) = (&inj.target, inj.injected_value) else {
                continue;
            };
            if let Some(slot) = values.get_mut(target) {
                *slot = value;
                replaced.push(target.clone());
            }
        }
        replaced
    }

    // ========================================================================
    // Operator commands
    // ========================================================================

    /// Activate a specific failure now, bypassing the probability draw and
    /// the enabled flag.
    /// The startup grace period only gates random draws.
    pub fn inject(&self, req: InjectRequest, now: Instant) -> Result<ChaosInjection, ChaosError> {
        let mut guard = self.lock();
        let st = &mut *guard;

        let failure_type = match req.failure_type {
            Some(t) => t,
            None => {
                let types = if st.failure_types.is_empty() {
                    FailureType::ALL.to_vec()
                } else {
                    st.failure_types.clone()
                };
                types[st.rng.gen_range(0..types.len())]
            }
        };

        let target = if failure_type.is_tag_scoped() {
            match req.target {
                Some(t) if self.tags.iter().any(|tag| tag.key == t) => Some(t),
                Some(t) => return Err(ChaosError::UnknownTag(t)),
                None if self.tags.is_empty() => return Err(ChaosError::UnknownTag(String::new())),
                None => {
                    let i = st.rng.gen_range(0..self.tags.len());
                    Some(self.tags[i].key.clone())
                }
            }
        } else {
            None
        };

        if let Some(secs) = req.duration_secs {
            let ok = match failure_type {
                FailureType::ValueAnomaly => {
                    (defaults::VALUE_ANOMALY_MIN_SECS..=defaults::VALUE_ANOMALY_MAX_SECS).contains(&secs)
                }
                FailureType::ServiceCrash => true,
                _ => secs > 0,
            };
            if !ok {
                return Err(ChaosError::InvalidDuration(format!(
                    "{secs}s is not valid for {failure_type}"
                )));
            }
        }

        if st
            .active
            .iter()
            .any(|i| i.failure_type == failure_type && i.target == target && i.is_active(now))
        {
            return Err(ChaosError::AlreadyActive {
                failure_type,
                target,
            });
        }

        let duration = self.duration_for(st, failure_type, req.duration_secs);
        Ok(self.activate(st, failure_type, duration, target, true, now))
    }

    pub fn enable(&self) -> Result<(), ChaosError> {
        let mut st = self.lock();
        if st.failure_types.is_empty() {
            return Err(ChaosError::NoFailureTypes);
        }
        st.enabled = true;
        tracing::info!(rate = st.rate, "Chaos injection enabled");
        Ok(())
    }

    /// Stop new random injections. Active ones run to expiry.
    pub fn disable(&self) {
        self.lock().enabled = false;
        tracing::info!("Chaos injection disabled");
    }

    pub fn set_rate(&self, rate: f64) -> Result<(), ChaosError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ChaosError::InvalidRate(rate));
        }
        self.lock().rate = rate;
        tracing::info!(rate, "Chaos injection rate updated");
        Ok(())
    }

    /// Replace the failure types used by random draws. Weights are dropped
    /// (selection becomes uniform).
    pub fn set_failure_types(&self, types: Vec<FailureType>) -> Result<(), ChaosError> {
        if types.is_empty() {
            return Err(ChaosError::NoFailureTypes);
        }
        let mut st = self.lock();
        tracing::info!(failure_types = ?types, "Chaos failure types updated");
        st.failure_types = types;
        st.weights = None;
        st.sampler = None;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn active(&self, now: Instant) -> Vec<ChaosInjection> {
        self.lock()
            .active
            .iter()
            .filter(|i| i.is_active(now))
            .cloned()
            .collect()
    }

    pub fn status(&self, now: Instant) -> ChaosStatus {
        let st = self.lock();
        ChaosStatus {
            enabled: st.enabled,
            injection_rate: st.rate,
            failure_types: st.failure_types.clone(),
            failure_weights: st.weights.clone(),
            active: st
                .active
                .iter()
                .filter(|i| i.is_active(now))
                .map(|i| i.snapshot(now))
                .collect(),
            recent: st.history.iter().rev().map(|i| i.snapshot(now)).collect(),
            total_injections: st.total,
            grace_remaining_secs: self.grace_remaining(now).as_secs_f64(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn duration_for(&self, st: &mut State, failure_type: FailureType, explicit: Option<u64>) -> Duration {
        match (failure_type, explicit) {
            (FailureType::ServiceCrash, _) => Duration::ZERO,
            (_, Some(secs)) => Duration::from_secs(secs),
            (FailureType::ValueAnomaly, None) => Duration::from_secs(
                st.rng
                    .gen_range(defaults::VALUE_ANOMALY_MIN_SECS..=defaults::VALUE_ANOMALY_MAX_SECS),
            ),
            (FailureType::NetworkTimeout, None) => self.network_timeout,
            (FailureType::ConnectionLoss, None) => self.connection_loss,
        }
    }

    fn activate(
        &self,
        st: &mut State,
        failure_type: FailureType,
        duration: Duration,
        target: Option<String>,
        manual: bool,
        now: Instant,
    ) -> ChaosInjection {
        let injected_value = target
            .as_ref()
            .and_then(|key| self.tags.iter().find(|t| &t.key == key))
            .and_then(TagConfig::anomalous_value);

        let inj = ChaosInjection {
            id: st.next_id,
            failure_type,
            started_at: Utc::now(),
            started: now,
            duration,
            target,
            injected_value,
            manual,
        };
        st.next_id += 1;
        st.total += 1;
        st.active.push(inj.clone());
        st.history.push_back(inj.clone());
        while st.history.len() > defaults::CHAOS_HISTORY_SIZE {
            st.history.pop_front();
        }

        tracing::warn!(
            id = inj.id,
            failure_type = %failure_type,
            duration_secs = duration.as_secs_f64(),
            target = inj.target.as_deref().unwrap_or("link"),
            manual,
            "Chaos injection activated"
        );
        inj
    }
}
