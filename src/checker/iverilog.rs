//! Icarus Verilog backend: compile the testbench with `iverilog`, simulate with `vvp`.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::command::run_command;
use super::traits::{ArtifactRunner, RunRequest, RunResult, RunStatus};
use super::{TRACE_FILE, dut_file, testbench_file};
use crate::error::Result;

/// Compile/run check for a Verilog testbench
#[derive(Debug, Clone)]
pub struct IverilogRunner {
    iverilog: String,
    vvp: String,
    /// Module header the testbench instantiates; written as an empty DUT stub
    dut_header: Option<String>,
}

impl Default for IverilogRunner {
    fn default() -> Self {
        Self::new("iverilog", "vvp")
    }
}

impl IverilogRunner {
    pub fn new(iverilog: impl Into<String>, vvp: impl Into<String>) -> Self {
        Self {
            iverilog: iverilog.into(),
            vvp: vvp.into(),
            dut_header: None,
        }
    }

    pub fn with_dut_header(mut self, header: impl Into<String>) -> Self {
        self.dut_header = Some(header.into());
        self
    }

    /// The DUT stub compiled next to the testbench
    pub fn dut_stub(header: &str) -> String {
        format!("{}\n\nendmodule\n", header)
    }

    fn vvp_file(task_id: &str) -> String {
        format!("{}.vvp", task_id)
    }

    async fn write_sources(&self, request: &RunRequest) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        if let Some(header) = &self.dut_header {
            let dut = dut_file(&request.task_id);
            tokio::fs::write(request.work_dir.join(&dut), Self::dut_stub(header)).await?;
            sources.push(dut);
        }
        let tb = testbench_file(&request.task_id);
        tokio::fs::write(request.work_dir.join(&tb), &request.source).await?;
        sources.push(tb);
        Ok(sources)
    }

    /// Remove the partial trace and compiled image left behind by a killed run
    async fn discard_partial(work_dir: &Path, task_id: &str) {
        for file in [TRACE_FILE.to_string(), Self::vvp_file(task_id)] {
            remove_if_present(&work_dir.join(file)).await;
        }
    }
}

/// Delete `path`, logging every failure except a missing file
async fn remove_if_present(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Time left for the simulation once compilation took `compiled`; `None`
/// when the hard timeout is already spent
fn simulation_budget(timeout: Duration, compiled: Duration) -> Option<Duration> {
    let remaining = timeout.saturating_sub(compiled);
    if remaining.is_zero() { None } else { Some(remaining) }
}

#[async_trait]
impl ArtifactRunner for IverilogRunner {
    async fn run(&self, request: RunRequest) -> Result<RunResult> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&request.work_dir).await?;
        // A stale trace must never be mistaken for this run's output
        remove_if_present(&request.work_dir.join(TRACE_FILE)).await;

        let sources = self.write_sources(&request).await?;
        let image = Self::vvp_file(&request.task_id);

        let mut compile_args = vec!["-g2012".to_string(), "-o".to_string(), image.clone()];
        compile_args.extend(sources);
        let compiled = run_command(&self.iverilog, &compile_args, &request.work_dir, request.timeout).await?;

        if compiled.timed_out {
            Self::discard_partial(&request.work_dir, &request.task_id).await;
            return Ok(RunResult::timed_out(request.timeout).with_duration(started.elapsed()));
        }
        if !compiled.success {
            return Ok(RunResult::not_started(compiled.combined()).with_duration(started.elapsed()));
        }

        let Some(remaining) = simulation_budget(request.timeout, compiled.duration) else {
            Self::discard_partial(&request.work_dir, &request.task_id).await;
            return Ok(RunResult::timed_out(request.timeout).with_duration(started.elapsed()));
        };
        let simulated = run_command(&self.vvp, &["-n".to_string(), image], &request.work_dir, remaining).await?;

        if simulated.timed_out {
            Self::discard_partial(&request.work_dir, &request.task_id).await;
            return Ok(RunResult::timed_out(request.timeout).with_duration(started.elapsed()));
        }

        let failed = !simulated.success || simulated.stderr.to_lowercase().contains("error");
        let status = if failed { RunStatus::Failed } else { RunStatus::Passed };
        let diagnostic = [compiled.stderr.trim_end(), simulated.stderr.trim_end()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        let mut result = RunResult::new(status, simulated.stdout, diagnostic);
        if failed && result.diagnostic.is_empty() {
            result.diagnostic = format!("simulation exited with code {:?}", simulated.code);
        }
        match tokio::fs::read_to_string(request.work_dir.join(TRACE_FILE)).await {
            Ok(trace) => result = result.with_trace(trace),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(result.with_duration(started.elapsed()))
    }

    fn description(&self) -> &str {
        "iverilog"
    }
}
