//! Windowed throughput counters for the debug overlay.

/// Update counters that roll over once per window.
///
/// The running counts accumulate during a window. When a window has
/// elapsed, the next [`debug_string`](Self::debug_string) call moves them to
/// the `*_last` snapshot and starts counting from zero again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateCounters {
    completed: u32,
    completed_last: u32,
    immediate: u32,
    immediate_last: u32,
    queued: u32,
    queued_last: u32,
    last_roll_ms: u64,
    window_ms: u64,
}

impl UpdateCounters {
    /// Creates zeroed counters with the given window length.
    pub fn new(window_ms: u64) -> Self {
        Self {
            completed: 0,
            completed_last: 0,
            immediate: 0,
            immediate_last: 0,
            queued: 0,
            queued_last: 0,
            last_roll_ms: 0,
            window_ms,
        }
    }

    /// A queued task finished building.
    pub fn record_completed(&mut self) {
        self.completed = self.completed.saturating_add(1);
    }

    /// An immediate build finished.
    pub fn record_immediate(&mut self) {
        self.immediate = self.immediate.saturating_add(1);
    }

    /// A task was accepted into the queue.
    pub fn record_queued(&mut self) {
        self.queued = self.queued.saturating_add(1);
    }

    /// Forgets the running queued count (the queue was flushed).
    pub fn reset_queued(&mut self) {
        self.queued = 0;
    }

    /// Completed builds in the running window.
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Immediate builds in the running window.
    pub fn immediate(&self) -> u32 {
        self.immediate
    }

    /// Accepted tasks in the running window.
    pub fn queued(&self) -> u32 {
        self.queued
    }

    /// Snapshots and resets the running counts if the window has elapsed.
    /// Returns whether a roll happened.
    pub fn roll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_roll_ms) <= self.window_ms {
            return false;
        }
        self.last_roll_ms = now_ms;
        self.completed_last = std::mem::take(&mut self.completed);
        self.immediate_last = std::mem::take(&mut self.immediate);
        self.queued_last = std::mem::take(&mut self.queued);
        true
    }

    /// Rolls if due, then formats `"Uq: <completed>/<queued>"` from the last
    /// full window. Immediate builds count towards both sides.
    pub fn debug_string(&mut self, now_ms: u64) -> String {
        self.roll(now_ms);
        format!(
            "Uq: {}/{}",
            self.completed_last.saturating_add(self.immediate_last),
            self.queued_last.saturating_add(self.immediate_last)
        )
    }
}

impl Default for UpdateCounters {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_roll_inside_window() {
        let mut counters = UpdateCounters::new(500);
        counters.record_completed();
        assert_eq!(counters.debug_string(500), "Uq: 0/0");
        assert_eq!(counters.completed(), 1);
    }

    #[test]
    fn test_roll_snapshots_and_resets() {
        let mut counters = UpdateCounters::new(500);
        for _ in 0..3 {
            counters.record_completed();
            counters.record_queued();
        }
        counters.record_queued();
        counters.record_immediate();

        assert_eq!(counters.debug_string(501), "Uq: 4/5");
        assert_eq!(counters.completed(), 0);
        assert_eq!(counters.queued(), 0);
        assert_eq!(counters.immediate(), 0);

        // Snapshot persists until the next window elapses.
        counters.record_completed();
        assert_eq!(counters.debug_string(900), "Uq: 4/5");
        assert_eq!(counters.debug_string(1_002), "Uq: 1/0");
    }

    #[test]
    fn test_counters_saturate_without_rolling() {
        let mut counters = UpdateCounters::new(500);
        counters.completed = u32::MAX - 1;
        counters.record_completed();
        counters.record_completed();
        assert_eq!(counters.completed(), u32::MAX);

        counters.immediate = u32::MAX;
        counters.record_immediate();
        assert_eq!(counters.debug_string(501), format!("Uq: {}/{}", u32::MAX, u32::MAX));
    }

    #[test]
    fn test_reset_queued() {
        let mut counters = UpdateCounters::new(10);
        counters.record_queued();
        counters.reset_queued();
        assert_eq!(counters.debug_string(11), "Uq: 0/0");
    }
}
