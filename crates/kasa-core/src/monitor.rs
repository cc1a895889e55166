//! Low-balance threshold monitor
//!
//! Two-state machine over the running total. Entering `Alerted` asks the
//! caller to send exactly one notification; staying below the threshold is
//! silent; climbing back to or above it re-arms the monitor.
//!
//! The state is process-local. Several server instances sharing one database
//! each keep their own copy, so each may alert once for the same drop.

use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    #[default]
    Normal,
    Alerted,
}

/// What a single check decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Crossed below the threshold: notify once
    EnteredAlert,
    /// Back at or above the threshold
    Recovered,
    /// No state change
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ThresholdMonitor {
    state: Mutex<AlertState>,
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known state (restored from elsewhere or for tests)
    pub fn with_state(state: AlertState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> AlertState {
        *self.lock()
    }

    /// Evaluate the running total against the threshold
    ///
    /// The transition is recorded before returning, so a failed notification
    /// afterwards does not revert it.
    pub fn check(&self, running_total: Decimal, threshold: Decimal) -> Transition {
        let mut state = self.lock();
        let transition = match (*state, running_total < threshold) {
            (AlertState::Normal, true) => {
                *state = AlertState::Alerted;
                Transition::EnteredAlert
            }
            (AlertState::Alerted, false) => {
                *state = AlertState::Normal;
                Transition::Recovered
            }
            _ => Transition::Unchanged,
        };
        debug!(
            %running_total,
            %threshold,
            state = ?*state,
            ?transition,
            "Balance threshold check"
        );
        transition
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AlertState> {
        // A poisoned lock still holds a valid two-state value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_single_notification_per_dip() {
        let monitor = ThresholdMonitor::new();
        let threshold = d(10_000);

        let sequence = [12_000, 8_000, 5_000, 11_000, 9_000];
        let notifications = sequence
            .iter()
            .map(|total| monitor.check(d(*total), threshold))
            .filter(|t| *t == Transition::EnteredAlert)
            .count();

        assert_eq!(notifications, 2);
        assert_eq!(monitor.state(), AlertState::Alerted);
    }

    #[test]
    fn test_transitions_step_by_step() {
        let monitor = ThresholdMonitor::new();
        let threshold = d(10_000);

        assert_eq!(monitor.check(d(12_000), threshold), Transition::Unchanged);
        assert_eq!(monitor.check(d(8_000), threshold), Transition::EnteredAlert);
        assert_eq!(monitor.check(d(5_000), threshold), Transition::Unchanged);
        assert_eq!(monitor.check(d(11_000), threshold), Transition::Recovered);
        assert_eq!(monitor.check(d(9_000), threshold), Transition::EnteredAlert);
    }

    #[test]
    fn test_exactly_at_threshold_is_normal() {
        let monitor = ThresholdMonitor::with_state(AlertState::Alerted);
        assert_eq!(monitor.check(d(10_000), d(10_000)), Transition::Recovered);
        assert_eq!(monitor.state(), AlertState::Normal);
        assert_eq!(monitor.check(d(10_000), d(10_000)), Transition::Unchanged);
    }

    #[test]
    fn test_first_check_below_threshold_alerts() {
        let monitor = ThresholdMonitor::new();
        assert_eq!(monitor.check(d(0), d(10_000)), Transition::EnteredAlert);
    }
}
