//! Per-task orchestration: up to `max_rounds` rounds of generate, then debug loop.

use std::time::Instant;

use crate::debug::{DebugLoop, LoopArtifacts, LoopReport};
use crate::domain::{OP_GEN, OP_SYNCHECK, RunInfo, Task};
use crate::error::{Result, TbloopError};
use crate::generate::GeneratedArtifacts;
use crate::storage::save_run_info;
use crate::workspace::{LoopWorkspace, TaskLayout};

use super::batch::TaskServices;
use super::{ErrorPolicy, PipelineSettings};

/// Result of one pipeline stage
#[derive(Debug)]
pub enum StageResult<T> {
    Success(T),
    /// The stage ran but its artifact did not validate
    ExpectedFailure { reason: String, value: T },
    /// A collaborator failed
    Fatal(TbloopError),
}

impl<T> From<Result<T>> for StageResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => StageResult::Success(value),
            Err(e) => StageResult::Fatal(e),
        }
    }
}

/// Runs one task through its rounds
pub struct TaskPipeline<'a> {
    task: &'a Task,
    settings: &'a PipelineSettings,
    services: TaskServices,
    layout: TaskLayout,
}

impl<'a> TaskPipeline<'a> {
    pub fn new(task: &'a Task, settings: &'a PipelineSettings, services: TaskServices) -> Self {
        Self {
            layout: TaskLayout::new(&settings.save_root, &task.task_id),
            task,
            settings,
            services,
        }
    }

    /// Run every round and persist the task's outputs.
    ///
    /// Returns `Err` only when a fatal stage error meets the `abort` policy.
    pub async fn run(self) -> Result<RunInfo> {
        let started = Instant::now();
        self.layout.create()?;
        let mut info = RunInfo::new(self.task, self.settings.max_rounds);
        let mut last_report: Option<LoopReport> = None;

        for round in 1..=self.settings.max_rounds {
            info.reboot_times = round - 1;
            log::info!("[{}] round {}/{}", self.task.task_id, round, self.settings.max_rounds);

            info.op_record.push(OP_GEN.to_string());
            let artifacts = match self.generate(round).await {
                StageResult::Success(artifacts) => artifacts,
                StageResult::ExpectedFailure { reason, .. } => {
                    log::warn!("[{}] generation rejected: {}", self.task.task_id, reason);
                    continue;
                }
                StageResult::Fatal(e) => {
                    self.fatal(&mut info, "generation", e)?;
                    continue;
                }
            };
            if artifacts.circuit_type.is_some() {
                info.circuit_type = artifacts.circuit_type.clone();
            }

            info.op_record.push(OP_SYNCHECK.to_string());
            match self.validate(round, artifacts).await {
                StageResult::Success(report) => {
                    info.incomplete = false;
                    info.error = None;
                    info.record_loop(&report.outcome);
                    last_report = Some(report);
                    break;
                }
                StageResult::ExpectedFailure { reason, value } => {
                    log::info!("[{}] round {} failed: {}", self.task.task_id, round, reason);
                    info.incomplete = false;
                    info.error = None;
                    info.record_loop(&value.outcome);
                    last_report = Some(value);
                }
                StageResult::Fatal(e) => {
                    self.fatal(&mut info, "validation", e)?;
                }
            }
        }

        if let Some(report) = &last_report {
            self.save_final_codes(report)?;
        }
        info.record_usage(&self.services.usage.totals());
        info.time = started.elapsed().as_secs_f64();
        info.finished_at = chrono::Utc::now();
        save_run_info(&self.layout.run_info_path(), &info)?;
        Ok(info)
    }

    async fn generate(&self, round: u32) -> StageResult<GeneratedArtifacts> {
        let dir = self.layout.gen_dir(round);
        StageResult::from(self.services.generator.generate(&dir).await)
    }

    async fn validate(&self, round: u32, artifacts: GeneratedArtifacts) -> StageResult<LoopReport> {
        let mut artifacts = LoopArtifacts::from(artifacts);
        if !self.settings.secondary {
            artifacts.checker = None;
        }
        let workspace = LoopWorkspace::new(self.layout.sim_dir(round));
        if let Err(e) = std::fs::create_dir_all(workspace.root()) {
            return StageResult::Fatal(e.into());
        }

        let debug_loop = DebugLoop::new(
            self.task.task_id.clone(),
            artifacts,
            self.settings.debug.clone(),
            self.services.collaborators.clone(),
            workspace,
        );
        match debug_loop.run().await {
            Ok(report) if report.outcome.passed => StageResult::Success(report),
            Ok(report) => StageResult::ExpectedFailure {
                reason: format!("validation failed after {} iterations", report.outcome.total_iterations()),
                value: report,
            },
            Err(e) => StageResult::Fatal(e),
        }
    }

    /// Apply the error policy to a fatal stage error
    fn fatal(&self, info: &mut RunInfo, stage: &str, error: TbloopError) -> Result<()> {
        log::error!("[{}] {} stage failed: {}", self.task.task_id, stage, error);
        match self.settings.error_policy {
            ErrorPolicy::Abort => Err(error),
            ErrorPolicy::Continue => {
                info.incomplete = true;
                info.error = Some(format!("{}: {}", stage, error));
                Ok(())
            }
        }
    }

    fn save_final_codes(&self, report: &LoopReport) -> Result<()> {
        if !self.settings.save_final_codes {
            return Ok(());
        }
        std::fs::write(self.layout.final_testbench_path(), &report.testbench)?;
        if let Some(checker) = &report.checker {
            std::fs::write(self.layout.final_checker_path(), checker)?;
        }
        Ok(())
    }
}
