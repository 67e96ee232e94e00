//! Debounce timer: coalesce mutation bursts into one scan pass
//!
//! Pure deadline state over `instant::Instant` - the host drives it with
//! explicit "now" values, so tests use fabricated instants instead of
//! sleeping. `schedule` is cancel-and-replace: a burst arriving before the
//! window elapses supersedes the pending deadline.

use instant::Instant;
use std::time::Duration;

/// Default window; short enough to feel immediate, long enough to coalesce
/// a render burst.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Debug)]
pub struct DebounceTimer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl DebounceTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start (or restart) the window. Any pending deadline is superseded.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Consume the deadline if due. Returns whether it fired.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
