//! In-memory simulated controller
//!
//! Serves every configured tag at its nominal value plus Gaussian jitter.
//! A cloneable [`SimulatedDeviceHandle`] lets callers pin values and script
//! link failures while the polling loop owns the device itself.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{DeviceLink, LinkError};
use crate::types::{TagConfig, TagValue};

#[derive(Debug)]
struct SimState {
    nominal: HashMap<String, TagValue>,
    /// Pinned values (scripted or written) that replace nominal+jitter.
    pinned: HashMap<String, TagValue>,
    /// Sticky failure returned by every read until cleared.
    failure: Option<LinkError>,
    /// One-shot failures consumed by the next reads, oldest first.
    queued_failures: Vec<LinkError>,
    closed: bool,
    reads: u64,
    writes: u64,
}

/// Simulated device link
pub struct SimulatedDevice {
    name: String,
    state: Arc<Mutex<SimState>>,
    jitter: f64,
    rng: StdRng,
}

impl SimulatedDevice {
    /// Build a device exposing every tag in `tags` under its device name.
    ///
    /// `jitter` is the relative standard deviation applied to numeric
    /// nominal values; `0.0` serves exact nominals.
    pub fn new(name: impl Into<String>, tags: &[TagConfig], jitter: f64) -> Self {
        let nominal = tags
            .iter()
            .map(|t| (t.device_name.clone(), t.nominal))
            .collect();
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(SimState {
                nominal,
                pinned: HashMap::new(),
                failure: None,
                queued_failures: Vec::new(),
                closed: false,
                reads: 0,
                writes: 0,
            })),
            jitter,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic jitter for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn handle(&self) -> SimulatedDeviceHandle {
        SimulatedDeviceHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn jittered(&mut self, nominal: TagValue) -> TagValue {
        if self.jitter <= 0.0 {
            return nominal;
        }
        let Some(base) = nominal.as_f64() else {
            return nominal;
        };
        let sigma = (base.abs() * self.jitter).max(f64::EPSILON);
        let noise = Normal::new(0.0, sigma).map_or(0.0, |n| n.sample(&mut self.rng));
        match nominal {
            TagValue::Integer(_) => TagValue::Integer((base + noise).round() as i64),
            _ => TagValue::Float(base + noise),
        }
    }
}

#[async_trait]
impl DeviceLink for SimulatedDevice {
    async fn read(&mut self, names: &[String]) -> Result<HashMap<String, TagValue>, LinkError> {
        // Resolve under the lock, jitter after releasing it
        let resolved: Vec<(String, TagValue, bool)> = {
            let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
            st.reads += 1;
            if st.closed {
                return Err(LinkError::ConnectionLost("link closed".to_string()));
            }
            if !st.queued_failures.is_empty() {
                return Err(st.queued_failures.remove(0));
            }
            if let Some(err) = &st.failure {
                return Err(err.clone());
            }
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                if let Some(v) = st.pinned.get(name) {
                    out.push((name.clone(), *v, true));
                } else if let Some(v) = st.nominal.get(name) {
                    out.push((name.clone(), *v, false));
                } else {
                    return Err(LinkError::Protocol(format!("unknown tag '{name}'")));
                }
            }
            out
        };

        Ok(resolved
            .into_iter()
            .map(|(name, value, pinned)| {
                let value = if pinned { value } else { self.jittered(value) };
                (name, value)
            })
            .collect())
    }

    async fn write(&mut self, name: &str, value: TagValue) -> Result<(), LinkError> {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if st.closed {
            return Err(LinkError::ConnectionLost("link closed".to_string()));
        }
        let Some(current) = st.nominal.get(name) else {
            return Err(LinkError::Protocol(format!("unknown tag '{name}'")));
        };
        let Some(coerced) = value.coerce(current.value_type()) else {
            return Err(LinkError::Protocol(format!(
                "type mismatch writing '{name}': expected {}",
                current.value_type()
            )));
        };
        st.writes += 1;
        st.pinned.insert(name.to_string(), coerced);
        tracing::debug!(tag = %name, value = %coerced, "Simulated device write");
        Ok(())
    }

    async fn close(&mut self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.closed = true;
        tracing::info!(link = %self.name, "Simulated device link closed");
    }

    fn link_name(&self) -> &str {
        &self.name
    }
}

/// Shared control over a [`SimulatedDevice`] owned elsewhere.
#[derive(Clone)]
pub struct SimulatedDeviceHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDeviceHandle {
    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut st)
    }

    /// Pin a tag (by device name) to a fixed value until cleared.
    pub fn set_value(&self, name: &str, value: TagValue) {
        self.with_state(|st| {
            st.pinned.insert(name.to_string(), value);
        });
    }

    /// Return a tag to nominal+jitter.
    pub fn clear_value(&self, name: &str) {
        self.with_state(|st| {
            st.pinned.remove(name);
        });
    }

    /// Fail every read with `err` until [`clear_failure`](Self::clear_failure).
    pub fn set_failure(&self, err: LinkError) {
        self.with_state(|st| st.failure = Some(err));
    }

    pub fn clear_failure(&self) {
        self.with_state(|st| st.failure = None);
    }

    /// Fail only the next read with `err`.
    pub fn fail_next(&self, err: LinkError) {
        self.with_state(|st| st.queued_failures.push(err));
    }

    pub fn reads(&self) -> u64 {
        self.with_state(|st| st.reads)
    }

    pub fn writes(&self) -> u64 {
        self.with_state(|st| st.writes)
    }

    pub fn is_closed(&self) -> bool {
        self.with_state(|st| st.closed)
    }
}
