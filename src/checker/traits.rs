//! Checker backend interfaces: what a run is asked to do and what it reports

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a single checker invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Ran to completion and the check passed
    Passed,
    /// Ran and failed
    Failed,
    /// Compilation failed, execution never started
    NotStarted,
    /// Killed after exceeding its timeout
    TimedOut,
}

/// Outcome of invoking an ArtifactRunner once
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub status: RunStatus,
    /// Raw standard output of the run
    pub stdout: String,
    /// Raw diagnostic/error text
    pub diagnostic: String,
    /// Output artifact written by the run (the simulator's signal trace)
    pub trace: Option<String>,
    pub duration: Duration,
}

impl RunResult {
    pub fn new(status: RunStatus, stdout: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            diagnostic: diagnostic.into(),
            trace: None,
            duration: Duration::ZERO,
        }
    }

    pub fn passed_with(stdout: impl Into<String>) -> Self {
        Self::new(RunStatus::Passed, stdout, "")
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self::new(RunStatus::Failed, "", diagnostic)
    }

    pub fn not_started(diagnostic: impl Into<String>) -> Self {
        Self::new(RunStatus::NotStarted, "", diagnostic)
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::new(RunStatus::TimedOut, "", timeout_message(timeout))
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn is_timeout(&self) -> bool {
        self.status == RunStatus::TimedOut
    }

    /// Drop any partial output so it cannot leak into a repair prompt
    pub fn discard_output(&mut self) {
        self.stdout.clear();
        self.trace = None;
    }

    /// What the run observed: the trace file when present, stdout otherwise
    pub fn observed(&self) -> &str {
        self.trace.as_deref().unwrap_or(&self.stdout)
    }
}

/// Diagnostic reported for a run killed by its timeout
pub fn timeout_message(timeout: Duration) -> String {
    format!("program is timeout after {}s", timeout.as_secs())
}

/// Everything a runner needs for one invocation
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub task_id: String,
    pub source: String,
    /// Directory the run materialises its files in
    pub work_dir: PathBuf,
    /// Input data made available to the run (the primary trace, for the checker)
    pub input: Option<String>,
    pub timeout: Duration,
}

/// Compiles/executes one artifact and reports a structured result.
///
/// `Err` is reserved for invocation failures (the tool itself could not be
/// started); anything the artifact does wrong is a `RunResult`.
#[async_trait]
pub trait ArtifactRunner: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<RunResult>;

    /// Short name used in logs
    fn description(&self) -> &str {
        "runner"
    }
}
