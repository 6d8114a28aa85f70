//! Python backend: runs the behavioral checker script against the simulation trace.

use std::time::Instant;

use async_trait::async_trait;

use super::command::run_command;
use super::traits::{ArtifactRunner, RunRequest, RunResult, RunStatus};
use super::{TRACE_FILE, checker_file};
use crate::error::Result;

/// Behavioral check executed by a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonRunner {
    python: String,
}

impl Default for PythonRunner {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PythonRunner {
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }
}

#[async_trait]
impl ArtifactRunner for PythonRunner {
    async fn run(&self, request: RunRequest) -> Result<RunResult> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&request.work_dir).await?;

        let script = checker_file(&request.task_id);
        tokio::fs::write(request.work_dir.join(&script), &request.source).await?;
        tokio::fs::write(request.work_dir.join(TRACE_FILE), request.input.as_deref().unwrap_or("")).await?;

        let output = run_command(&self.python, &[script], &request.work_dir, request.timeout).await?;
        if output.timed_out {
            return Ok(RunResult::timed_out(request.timeout).with_duration(started.elapsed()));
        }

        let status = if output.success {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        Ok(RunResult::new(status, output.stdout, output.stderr).with_duration(started.elapsed()))
    }

    fn description(&self) -> &str {
        "python"
    }
}
