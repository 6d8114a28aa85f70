//! Terminal records of a debug loop invocation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// How one entry into the behavioral-check state machine ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryOutcome {
    Passed,
    /// Budget exhausted without a pass
    Failed,
    /// Failure streak crossed the rollback threshold; both artifacts must be regenerated
    EscalateBothReboot,
}

/// Per-backend summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendReport {
    pub passed: bool,
    pub iterations_used: u32,
    pub reboots: u32,
    /// Duration of the last run, if the backend ran at all
    pub last_run: Option<Duration>,
}

/// Created once at loop exit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub passed: bool,
    pub primary: BackendReport,
    /// `None` when behavioral checking was disabled for the task
    pub secondary: Option<BackendReport>,
    pub escalations: u32,
    /// Usage of the repair calls made by the loop
    pub usage: Usage,
    pub elapsed: Duration,
}

impl LoopOutcome {
    /// Iterations used by both backends
    pub fn total_iterations(&self) -> u32 {
        self.primary.iterations_used + self.secondary.as_ref().map_or(0, |s| s.iterations_used)
    }
}

/// Outcome plus the artifacts handed back to the caller
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub outcome: LoopOutcome,
    pub testbench: String,
    pub checker: Option<String>,
}
