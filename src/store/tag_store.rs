//! Latest values, bounded per-tag history and violation records
//!
//! Single writer (the polling loop), many readers (API, remediation).
//! A `std::sync::RwLock` guards everything; no lock is held across `.await`.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;

use crate::types::{TagConfig, TagReading, TagValue, Violation};

/// Violations opened and closed by one tick.
#[derive(Debug, Default, Clone)]
pub struct ViolationChanges {
    pub opened: Vec<Violation>,
    pub resolved: Vec<Violation>,
}

/// Current view of one tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagSnapshot {
    pub tag: String,
    pub device_name: String,
    pub latest: Option<TagReading>,
    pub violating: bool,
    pub samples: usize,
}

#[derive(Default)]
struct Inner {
    history: HashMap<String, VecDeque<TagReading>>,
    active: BTreeMap<String, Violation>,
    /// Resolved violations, oldest first.
    resolved: VecDeque<Violation>,
    next_violation_id: u64,
}

pub struct TagStore {
    inner: RwLock<Inner>,
    tags: Vec<TagConfig>,
    history_size: usize,
    violation_history_size: usize,
}

impl TagStore {
    pub fn new(tags: Vec<TagConfig>, history_size: usize, violation_history_size: usize) -> Self {
        let history = tags
            .iter()
            .map(|t| (t.key.clone(), VecDeque::with_capacity(history_size.min(1024))))
            .collect();
        Self {
            inner: RwLock::new(Inner {
                history,
                next_violation_id: 1,
                ..Inner::default()
            }),
            tags,
            history_size: history_size.max(1),
            violation_history_size: violation_history_size.max(1),
        }
    }

    pub fn tags(&self) -> &[TagConfig] {
        &self.tags
    }

    /// Record one successful tick: store every reading and open or resolve
    /// violations according to `violates`.
    ///
    /// Everything happens under one write lock so readers never see a
    /// reading without its matching violation state.
    pub fn record_tick<'a>(
        &self,
        samples: impl IntoIterator<Item = (&'a TagConfig, TagReading, bool)>,
    ) -> ViolationChanges {
        let mut changes = ViolationChanges::default();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        for (tag, reading, violates) in samples {
            let was_active = inner.active.contains_key(&tag.key);
            match (violates, was_active) {
                (true, false) => {
                    let id = inner.next_violation_id;
                    inner.next_violation_id += 1;
                    let v = Violation {
                        id,
                        tag: tag.key.clone(),
                        condition: tag.condition.name().to_string(),
                        condition_detail: tag.condition.to_string(),
                        observed_value: reading.value,
                        nominal: tag.nominal,
                        started_at: reading.timestamp,
                        resolved_at: None,
                        active: true,
                    };
                    inner.active.insert(tag.key.clone(), v.clone());
                    changes.opened.push(v);
                }
                (false, true) => {
                    if let Some(mut v) = inner.active.remove(&tag.key) {
                        v.resolved_at = Some(reading.timestamp);
                        v.active = v.is_active();
                        inner.resolved.push_back(v.clone());
                        while inner.resolved.len() > self.violation_history_size {
                            inner.resolved.pop_front();
                        }
                        changes.resolved.push(v);
                    }
                }
                _ => {}
            }

            let buf = inner.history.entry(tag.key.clone()).or_default();
            buf.push_back(reading);
            while buf.len() > self.history_size {
                buf.pop_front();
            }
        }

        changes
    }

    pub fn latest(&self, tag: &str) -> Option<TagReading> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.history.get(tag).and_then(|h| h.back().cloned())
    }

    /// Up to `limit` most recent readings for `tag`, oldest first.
    /// `None` if the tag is not configured.
    pub fn history(&self, tag: &str, limit: usize) -> Option<Vec<TagReading>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let h = inner.history.get(tag)?;
        let skip = h.len().saturating_sub(limit);
        Some(h.iter().skip(skip).cloned().collect())
    }

    pub fn snapshot(&self) -> Vec<TagSnapshot> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        self.tags
            .iter()
            .map(|t| {
                let h = inner.history.get(&t.key);
                TagSnapshot {
                    tag: t.key.clone(),
                    device_name: t.device_name.clone(),
                    latest: h.and_then(|h| h.back().cloned()),
                    violating: inner.active.contains_key(&t.key),
                    samples: h.map_or(0, VecDeque::len),
                }
            })
            .collect()
    }

    pub fn active_violations(&self) -> Vec<Violation> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.active.values().cloned().collect()
    }

    pub fn active_violation(&self, tag: &str) -> Option<Violation> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.active.get(tag).cloned()
    }

    /// Active and resolved violations, newest first, at most `limit`.
    pub fn recent_violations(&self, limit: usize) -> Vec<Violation> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Violation> = inner
            .active
            .values()
            .chain(inner.resolved.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all.truncate(limit);
        all
    }
}

/// Build a reading stamped now.
pub fn reading_now(tag: &str, value: TagValue, provenance: crate::types::Provenance) -> TagReading {
    TagReading {
        tag: tag.to_string(),
        value,
        timestamp: Utc::now(),
        provenance,
    }
}
