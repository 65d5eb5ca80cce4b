//! Call-site debounce for history saves.
//!
//! Bursts of edits are coalesced: a save is due only after the store has been
//! quiet for `quiet_window` and at least `min_gap` has passed since the last
//! save.

use std::time::{Duration, Instant};

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(500);
pub const DEFAULT_MIN_GAP: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct SaveThrottle {
    quiet_window: Duration,
    min_gap: Duration,
    last_change: Option<Instant>,
    last_save: Option<Instant>,
}

impl Default for SaveThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW, DEFAULT_MIN_GAP)
    }
}

impl SaveThrottle {
    pub fn new(quiet_window: Duration, min_gap: Duration) -> Self {
        Self {
            quiet_window,
            min_gap,
            last_change: None,
            last_save: None,
        }
    }

    /// Notes an edit that should eventually be saved.
    pub fn record_change(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    /// Whether a pending change may be saved at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        let Some(changed_at) = self.last_change else {
            return false;
        };
        let quiet = now.saturating_duration_since(changed_at) >= self.quiet_window;
        let spaced = self
            .last_save
            .map_or(true, |saved_at| now.saturating_duration_since(saved_at) >= self.min_gap);
        quiet && spaced
    }

    /// Clears the pending change after a save went through.
    pub fn mark_saved(&mut self, now: Instant) {
        self.last_change = None;
        self.last_save = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::SaveThrottle;
    use std::time::{Duration, Instant};

    #[test]
    fn burst_is_coalesced_until_quiet() {
        let mut throttle = SaveThrottle::new(Duration::from_millis(100), Duration::from_millis(300));
        let start = Instant::now();

        throttle.record_change(start);
        throttle.record_change(start + Duration::from_millis(50));
        assert!(!throttle.is_due(start + Duration::from_millis(120)));
        assert!(throttle.is_due(start + Duration::from_millis(150)));

        throttle.mark_saved(start + Duration::from_millis(150));
        assert!(!throttle.is_due(start + Duration::from_millis(400)));

        throttle.record_change(start + Duration::from_millis(200));
        assert!(!throttle.is_due(start + Duration::from_millis(400)));
        assert!(throttle.is_due(start + Duration::from_millis(450)));
    }
}
