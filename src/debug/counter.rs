//! Per-backend iteration counters

use serde::{Deserialize, Serialize};

/// What the next failing iteration does to the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Patch the current artifact in place
    Debug,
    /// Throw the artifact away and regenerate it
    Reboot,
}

/// Iteration bookkeeping for one backend.
///
/// `used` never decreases within one loop invocation. `since_reboot` counts
/// debug iterations since the last reboot and drops back to 0 on every reboot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugCounter {
    used: u32,
    since_reboot: u32,
}

impl DebugCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn since_reboot(&self) -> u32 {
        self.since_reboot
    }

    pub fn exhausted(&self, max: u32) -> bool {
        self.used >= max
    }

    /// Spend one iteration and pick debug or reboot for it
    pub fn next_step(&mut self, reboot_threshold: u32) -> Step {
        self.used += 1;
        if self.since_reboot < reboot_threshold {
            self.since_reboot += 1;
            Step::Debug
        } else {
            self.since_reboot = 0;
            Step::Reboot
        }
    }

    /// Make the next iteration a reboot regardless of the debug streak
    pub fn force_reboot(&mut self, reboot_threshold: u32) {
        self.since_reboot = reboot_threshold;
    }

    pub fn reset_since_reboot(&mut self) {
        self.since_reboot = 0;
    }
}
