//! Deadline timers
//!
//! Timers are plain deadlines. The host wakes the observation layer at
//! `next_deadline()` and the layer asks each timer whether it is due.

use crate::types::Millis;

/// Collapses a burst of triggers into one firing after a quiet period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounce {
    delay: Millis,
    deadline: Option<Millis>,
}

impl Debounce {
    pub fn new(delay: Millis) -> Self {
        Self { delay, deadline: None }
    }

    /// Restart the quiet period. A pending deadline is replaced, never stacked.
    pub fn trigger(&mut self, now: Millis) {
        self.deadline = Some(now.saturating_add(self.delay));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// True exactly once per quiet period, at or after the deadline.
    pub fn fire(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

/// One-shot timer. Scheduling again replaces the pending deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Millis>,
}

impl Timer {
    pub fn schedule(&mut self, at: Millis) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn fire(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Millis>>) -> Option<Millis> {
    deadlines.into_iter().flatten().min()
}
