//! Service monitor
//!
//! Watches the filter's own health: the accessibility permission being
//! revoked, and the process having been killed between heartbeats.

use crate::error::CoreError;
use crate::notify::NotificationKind;
use crate::state::StateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Lifecycle-scoped health state
#[derive(Debug)]
pub struct ServiceMonitor {
    accessibility_off_reported: AtomicBool,
    force_stop_threshold_ms: i64,
}

impl ServiceMonitor {
    pub fn new(force_stop_threshold_ms: i64) -> Self {
        Self {
            accessibility_off_reported: AtomicBool::new(false),
            force_stop_threshold_ms,
        }
    }

    /// Record the accessibility service state.
    ///
    /// Yields a notification only for the first report of each disabled
    /// period.
    pub fn on_accessibility_state(&self, enabled: bool) -> Option<NotificationKind> {
        if enabled {
            if self.accessibility_off_reported.swap(false, Ordering::SeqCst) {
                info!("Accessibility service re-enabled");
            }
            return None;
        }

        if self.accessibility_off_reported.swap(true, Ordering::SeqCst) {
            None
        } else {
            info!("Accessibility service disabled");
            Some(NotificationKind::AccessibilityOff)
        }
    }

    /// Compare the stored heartbeat with `now_ms` and record a new one.
    ///
    /// A gap above the threshold after a previous run means the app was
    /// killed in between.
    pub fn check_for_force_stop(
        &self,
        store: &dyn StateStore,
        now_ms: i64,
    ) -> Result<Option<NotificationKind>, CoreError> {
        let last_run = store.load_last_run()?;
        let gap = now_ms.saturating_sub(last_run);
        store.save_last_run(now_ms)?;

        if last_run != 0 && gap > self.force_stop_threshold_ms {
            info!("Heartbeat gap of {} ms, assuming force stop", gap);
            Ok(Some(NotificationKind::AppForceStopped))
        } else {
            debug!("Heartbeat recorded at {}", now_ms);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;

    const THRESHOLD: i64 = 300_000;

    #[test]
    fn test_accessibility_off_reported_once_per_period() {
        let monitor = ServiceMonitor::new(THRESHOLD);
        assert_eq!(
            monitor.on_accessibility_state(false),
            Some(NotificationKind::AccessibilityOff)
        );
        assert_eq!(monitor.on_accessibility_state(false), None);

        assert_eq!(monitor.on_accessibility_state(true), None);
        assert_eq!(
            monitor.on_accessibility_state(false),
            Some(NotificationKind::AccessibilityOff)
        );
    }

    #[test]
    fn test_first_run_is_not_a_force_stop() {
        let monitor = ServiceMonitor::new(THRESHOLD);
        let store = MemoryStore::new();
        assert_eq!(monitor.check_for_force_stop(&store, 10_000_000).unwrap(), None);
        assert_eq!(store.load_last_run().unwrap(), 10_000_000);
    }

    #[test]
    fn test_gap_above_threshold_detected() {
        let monitor = ServiceMonitor::new(THRESHOLD);
        let store = MemoryStore::new();
        store.save_last_run(1_000).unwrap();

        assert_eq!(
            monitor.check_for_force_stop(&store, 1_000 + THRESHOLD + 1).unwrap(),
            Some(NotificationKind::AppForceStopped)
        );
        assert_eq!(store.load_last_run().unwrap(), 1_000 + THRESHOLD + 1);
    }

    #[test]
    fn test_gap_at_threshold_ignored() {
        let monitor = ServiceMonitor::new(THRESHOLD);
        let store = MemoryStore::new();
        store.save_last_run(1_000).unwrap();
        assert_eq!(
            monitor.check_for_force_stop(&store, 1_000 + THRESHOLD).unwrap(),
            None
        );
    }
}
