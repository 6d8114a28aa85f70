//! The debug/reboot loop that drives a generated testbench and its checker
//! until both pass or their budgets run out.
//!
//! - `counter`: per-backend iteration counters
//! - `linemark`: line numbering of code sent for repair
//! - `diagnostic`: traceback truncation, timeout passthrough
//! - `focus`: scaffold/core split of checker scripts
//! - `engine`: the two state machines and the orchestrator
//! - `outcome`: terminal records

pub mod counter;
pub mod diagnostic;
pub mod engine;
pub mod focus;
pub mod linemark;
pub mod outcome;
pub mod prompts;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use counter::{DebugCounter, Step};
pub use engine::{Collaborators, DebugLoop, LoopArtifacts};
pub use focus::FocusSplit;
pub use linemark::{add_linemarks, strip_linemarks};
pub use outcome::{BackendReport, LoopOutcome, LoopReport, SecondaryOutcome};

/// Lifetime of the behavioral-check rollback counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackScope {
    /// Reset every time the behavioral check is entered
    #[default]
    PerEntry,
    /// Kept across re-entries after a reboot of both artifacts
    Persistent,
}

/// Budgets and switches of one loop
#[derive(Debug, Clone, PartialEq)]
pub struct DebugSettings {
    /// Iteration budget per backend
    pub max_iterations: u32,
    /// Debug iterations allowed before a reboot
    pub reboot_threshold: u32,
    /// Behavioral-check failures that trigger a reboot of both artifacts
    pub rollback_threshold: u32,
    pub rollback_scope: RollbackScope,
    /// Traceback frames kept in checker diagnostics
    pub error_depth: usize,
    /// Send only the non-scaffold part of a checker for repair
    pub focus: bool,
    /// Hard timeout of each run
    pub run_timeout: Duration,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            reboot_threshold: 3,
            rollback_threshold: 2,
            rollback_scope: RollbackScope::PerEntry,
            error_depth: 1,
            focus: true,
            run_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_scope_serde() {
        assert_eq!(serde_yaml::to_string(&RollbackScope::PerEntry).unwrap().trim(), "per-entry");
        let scope: RollbackScope = serde_yaml::from_str("persistent").unwrap();
        assert_eq!(scope, RollbackScope::Persistent);
    }
}
