//! Per-action remediation cooldown tracker

use crate::types::RemediationAction;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum gap between two attempts of the same action.
///
/// The clock is per action, not per tag: two tags mapped to the same action
/// share one cooldown window.
pub struct Cooldown {
    window: Duration,
    last_triggered: HashMap<RemediationAction, Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_triggered: HashMap::new(),
        }
    }

    /// Time left before `action` may trigger again; zero when allowed.
    pub fn remaining(&self, action: RemediationAction, now: Instant) -> Duration {
        match self.last_triggered.get(&action) {
            None => Duration::ZERO,
            Some(last) => (*last + self.window).saturating_duration_since(now),
        }
    }

    pub fn is_ready(&self, action: RemediationAction, now: Instant) -> bool {
        self.remaining(action, now).is_zero()
    }

    /// Record that an attempt for `action` was triggered at `now`.
    pub fn record(&mut self, action: RemediationAction, now: Instant) {
        self.last_triggered.insert(action, now);
    }

    pub fn last_triggered(&self, action: RemediationAction) -> Option<Instant> {
        self.last_triggered.get(&action).copied()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_first_trigger() {
        let cd = Cooldown::new(Duration::from_secs(30));
        assert!(cd.is_ready(RemediationAction::Stop, Instant::now()));
    }

    #[test]
    fn suppresses_within_window() {
        let mut cd = Cooldown::new(Duration::from_secs(30));
        let t0 = Instant::now();
        cd.record(RemediationAction::Stop, t0);
        let t10 = t0 + Duration::from_secs(10);
        assert!(!cd.is_ready(RemediationAction::Stop, t10));
        assert_eq!(cd.remaining(RemediationAction::Stop, t10), Duration::from_secs(20));
    }

    #[test]
    fn remembers_last_trigger_per_action() {
        let mut cd = Cooldown::new(Duration::from_secs(30));
        assert_eq!(cd.window(), Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(cd.last_triggered(RemediationAction::Stop).is_none());
        cd.record(RemediationAction::Stop, t0);
        cd.record(RemediationAction::Stop, t0 + Duration::from_secs(40));
        assert_eq!(
            cd.last_triggered(RemediationAction::Stop),
            Some(t0 + Duration::from_secs(40))
        );
        assert!(cd.last_triggered(RemediationAction::Reset).is_none());
    }

    #[test]
    fn allows_different_action() {
        let mut cd = Cooldown::new(Duration::from_secs(30));
        let t0 = Instant::now();
        cd.record(RemediationAction::Stop, t0);
        assert!(cd.is_ready(RemediationAction::Reset, t0));
    }

    #[test]
    fn allows_once_window_elapsed() {
        let mut cd = Cooldown::new(Duration::from_secs(30));
        let t0 = Instant::now();
        cd.record(RemediationAction::Stop, t0);
        assert!(cd.is_ready(RemediationAction::Stop, t0 + Duration::from_secs(30)));
        assert!(cd.is_ready(RemediationAction::Stop, t0 + Duration::from_secs(31)));
    }

    #[test]
    fn zero_window_never_blocks() {
        let mut cd = Cooldown::new(Duration::ZERO);
        let t0 = Instant::now();
        cd.record(RemediationAction::Restart, t0);
        assert!(cd.is_ready(RemediationAction::Restart, t0));
    }
}
