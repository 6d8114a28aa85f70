//! DebugLoop: the primary and secondary state machines and the orchestrator
//! that alternates between them.
//!
//! The primary machine validates the testbench with the simulator. Only when
//! it passes does the secondary machine run the checker script against the
//! trace the testbench produced. A secondary failure streak that crosses the
//! rollback threshold comes back as [`SecondaryOutcome::EscalateBothReboot`];
//! the orchestrator then arms the escalation flag and re-enters the primary
//! machine, whose next iteration regenerates both artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::counter::{DebugCounter, Step};
use super::diagnostic::{raw_diagnostic, secondary_diagnostic};
use super::focus::FocusSplit;
use super::linemark::{add_linemarks, strip_linemarks};
use super::outcome::{BackendReport, LoopOutcome, LoopReport, SecondaryOutcome};
use super::prompts;
use super::{DebugSettings, RollbackScope};
use crate::checker::{ArtifactRunner, Backend, RunRequest, RunResult};
use crate::error::Result;
use crate::generate::{GeneratedArtifacts, RegenerationSource};
use crate::llm::Usage;
use crate::progress::{ProgressEvent, ProgressKind, ProgressSink};
use crate::repair::{RepairRequest, RepairRequester};
use crate::workspace::LoopWorkspace;

/// Services the loop borrows; it owns none of them
#[derive(Clone)]
pub struct Collaborators {
    pub primary_runner: Arc<dyn ArtifactRunner>,
    pub secondary_runner: Arc<dyn ArtifactRunner>,
    pub repairer: Arc<dyn RepairRequester>,
    pub regenerator: Arc<dyn RegenerationSource>,
    pub progress: Arc<dyn ProgressSink>,
}

/// Artifacts handed to the loop at entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopArtifacts {
    pub testbench: String,
    /// `None` disables the behavioral check
    pub checker: Option<String>,
    pub checker_focus: bool,
}

impl From<GeneratedArtifacts> for LoopArtifacts {
    fn from(generated: GeneratedArtifacts) -> Self {
        Self {
            testbench: generated.testbench,
            checker: generated.checker,
            checker_focus: generated.checker_focus,
        }
    }
}

pub struct DebugLoop {
    task_id: String,
    settings: DebugSettings,
    collaborators: Collaborators,
    workspace: LoopWorkspace,

    testbench: String,
    checker: Option<String>,
    focus: bool,

    primary: DebugCounter,
    secondary: DebugCounter,
    /// Failed behavioral runs counted toward escalation
    rollback: u32,
    /// Set by an escalation, cleared by the primary machine
    reboot_both: bool,
    escalations: u32,

    primary_passed: bool,
    secondary_passed: bool,
    primary_reboots: u32,
    secondary_reboots: u32,
    primary_result: Option<RunResult>,
    secondary_result: Option<RunResult>,
    /// Directory of the latest testbench run; the checker starts there
    current_dir: PathBuf,

    usage: Usage,
    started: Instant,
}

impl DebugLoop {
    pub fn new(
        task_id: impl Into<String>,
        artifacts: LoopArtifacts,
        settings: DebugSettings,
        collaborators: Collaborators,
        workspace: LoopWorkspace,
    ) -> Self {
        let current_dir = workspace.root().to_path_buf();
        Self {
            task_id: task_id.into(),
            focus: settings.focus && artifacts.checker_focus,
            settings,
            collaborators,
            workspace,
            testbench: artifacts.testbench,
            checker: artifacts.checker,
            primary: DebugCounter::new(),
            secondary: DebugCounter::new(),
            rollback: 0,
            reboot_both: false,
            escalations: 0,
            primary_passed: false,
            secondary_passed: false,
            primary_reboots: 0,
            secondary_reboots: 0,
            primary_result: None,
            secondary_result: None,
            current_dir,
            usage: Usage::default(),
            started: Instant::now(),
        }
    }

    /// Run until both backends pass, the primary budget runs out, or a
    /// collaborator fails. Exhaustion is a normal outcome, not an error.
    pub async fn run(mut self) -> Result<LoopReport> {
        log::info!(
            "[{}] debug loop started (max {}, reboot after {}, behavioral check {})",
            self.task_id,
            self.settings.max_iterations,
            self.settings.reboot_threshold,
            if self.checker.is_some() { "on" } else { "off" }
        );

        loop {
            self.primary_passed = self.run_primary().await?;
            if !self.primary_passed || self.checker.is_none() {
                break;
            }

            match self.run_secondary().await? {
                SecondaryOutcome::Passed => {
                    self.secondary_passed = true;
                    break;
                }
                SecondaryOutcome::Failed => break,
                SecondaryOutcome::EscalateBothReboot => {
                    self.escalations += 1;
                    self.reboot_both = true;
                    self.primary.force_reboot(self.settings.reboot_threshold);
                    self.primary_passed = false;
                }
            }
        }

        Ok(self.finish())
    }

    async fn run_primary(&mut self) -> Result<bool> {
        let mut passed = if self.reboot_both {
            false
        } else {
            self.report(Backend::Primary, ProgressKind::InitialRun);
            let dir = self.workspace.root().to_path_buf();
            self.run_testbench(&dir).await?
        };

        while !passed && !self.primary.exhausted(self.settings.max_iterations) {
            let step = self.primary.next_step(self.settings.reboot_threshold);
            let dir = self
                .workspace
                .iteration_dir(self.total_iterations(), step == Step::Reboot)?;
            match step {
                Step::Debug => {
                    self.report(Backend::Primary, ProgressKind::Debug);
                    self.debug_testbench(&dir).await?;
                }
                Step::Reboot => {
                    self.report(Backend::Primary, ProgressKind::Reboot);
                    self.reboot_testbench(&dir).await?;
                }
            }
            passed = self.run_testbench(&dir).await?;
        }

        if self.reboot_both {
            log::info!(
                "[{}] reboot of both artifacts skipped: testbench budget ({}) already spent",
                self.task_id,
                self.settings.max_iterations
            );
            self.reboot_both = false;
        }
        self.workspace.clean_waveforms()?;

        let kind = if passed {
            ProgressKind::Passed
        } else {
            ProgressKind::Exhausted
        };
        self.report(Backend::Primary, kind);
        Ok(passed)
    }

    async fn run_secondary(&mut self) -> Result<SecondaryOutcome> {
        self.secondary.reset_since_reboot();
        if self.settings.rollback_scope == RollbackScope::PerEntry {
            self.rollback = 0;
        }
        let trace = self
            .primary_result
            .as_ref()
            .map(|r| r.observed().to_string())
            .unwrap_or_default();

        self.report(Backend::Secondary, ProgressKind::InitialRun);
        let dir = self.current_dir.clone();
        let mut passed = self.run_checker(&dir, &trace).await?;

        while !passed && !self.secondary.exhausted(self.settings.max_iterations) {
            if self.rollback >= self.settings.rollback_threshold {
                log::info!(
                    "[{}] checker failed {} times, rebooting testbench and checker",
                    self.task_id,
                    self.rollback
                );
                self.report(Backend::Secondary, ProgressKind::Escalated);
                return Ok(SecondaryOutcome::EscalateBothReboot);
            }

            let step = self.secondary.next_step(self.settings.reboot_threshold);
            let dir = self
                .workspace
                .iteration_dir(self.total_iterations(), step == Step::Reboot)?;
            match step {
                Step::Debug => {
                    self.report(Backend::Secondary, ProgressKind::Debug);
                    self.debug_checker(&dir).await?;
                }
                Step::Reboot => {
                    self.report(Backend::Secondary, ProgressKind::Reboot);
                    self.reboot_checker(&dir).await?;
                }
            }
            passed = self.run_checker(&dir, &trace).await?;
        }

        if passed {
            self.report(Backend::Secondary, ProgressKind::Passed);
            Ok(SecondaryOutcome::Passed)
        } else {
            self.report(Backend::Secondary, ProgressKind::Exhausted);
            Ok(SecondaryOutcome::Failed)
        }
    }

    async fn run_testbench(&mut self, dir: &Path) -> Result<bool> {
        let request = RunRequest {
            task_id: self.task_id.clone(),
            source: self.testbench.clone(),
            work_dir: dir.to_path_buf(),
            input: None,
            timeout: self.settings.run_timeout,
        };
        let mut result = self.collaborators.primary_runner.run(request).await?;
        if result.is_timeout() {
            result.discard_output();
        }
        self.workspace.write_run_output(dir, Backend::Primary.as_str(), &result)?;
        log::debug!("[{}] testbench run in {}: {:?}", self.task_id, dir.display(), result.status);

        self.current_dir = dir.to_path_buf();
        let passed = result.passed();
        self.primary_result = Some(result);
        Ok(passed)
    }

    async fn run_checker(&mut self, dir: &Path, trace: &str) -> Result<bool> {
        let request = RunRequest {
            task_id: self.task_id.clone(),
            source: self.checker.clone().unwrap_or_default(),
            work_dir: dir.to_path_buf(),
            input: Some(trace.to_string()),
            timeout: self.settings.run_timeout,
        };
        let mut result = self.collaborators.secondary_runner.run(request).await?;
        if result.is_timeout() {
            result.discard_output();
        }
        self.workspace.write_run_output(dir, Backend::Secondary.as_str(), &result)?;
        log::debug!("[{}] checker run in {}: {:?}", self.task_id, dir.display(), result.status);

        let passed = result.passed();
        if !passed {
            self.rollback += 1;
        }
        self.secondary_result = Some(result);
        Ok(passed)
    }

    async fn debug_testbench(&mut self, dir: &Path) -> Result<()> {
        let diagnostic = self
            .primary_result
            .as_ref()
            .map(|r| raw_diagnostic(r).to_string())
            .unwrap_or_default();
        let prompt = prompts::testbench_repair(&add_linemarks(&self.testbench), &diagnostic);
        let code = self.request_repair(dir, prompt, Backend::Primary).await?;
        self.testbench = strip_linemarks(&code);
        Ok(())
    }

    async fn debug_checker(&mut self, dir: &Path) -> Result<()> {
        let checker = self.checker.clone().unwrap_or_default();
        let split = if self.focus {
            FocusSplit::split(&checker)
        } else {
            FocusSplit::unfocused(&checker)
        };
        let diagnostic = self
            .secondary_result
            .as_ref()
            .map(|r| secondary_diagnostic(r, self.settings.error_depth))
            .unwrap_or_default();
        let prompt = prompts::checker_repair(&add_linemarks(&split.core), &diagnostic);
        let code = self.request_repair(dir, prompt, Backend::Secondary).await?;
        self.checker = Some(split.reassemble(&strip_linemarks(&code)));
        Ok(())
    }

    async fn request_repair(&mut self, dir: &Path, prompt: String, backend: Backend) -> Result<String> {
        let reply = self
            .collaborators
            .repairer
            .repair(RepairRequest {
                prompt,
                language: backend.language().to_string(),
            })
            .await?;
        self.usage.add(&reply.usage);
        self.workspace.write_transcript(dir, &reply.transcript)?;
        Ok(reply.code)
    }

    async fn reboot_testbench(&mut self, dir: &Path) -> Result<()> {
        self.testbench = self.collaborators.regenerator.reboot(dir, Backend::Primary).await?;
        self.primary_reboots += 1;

        if self.reboot_both {
            if self.checker.is_some() {
                let checker = self.collaborators.regenerator.reboot(dir, Backend::Secondary).await?;
                self.checker = Some(checker);
                self.secondary_reboots += 1;
            }
            self.reboot_both = false;
        }
        Ok(())
    }

    async fn reboot_checker(&mut self, dir: &Path) -> Result<()> {
        let checker = self.collaborators.regenerator.reboot(dir, Backend::Secondary).await?;
        self.checker = Some(checker);
        self.secondary_reboots += 1;
        Ok(())
    }

    fn total_iterations(&self) -> u32 {
        self.primary.used() + self.secondary.used()
    }

    fn report(&self, backend: Backend, kind: ProgressKind) {
        let counter = match backend {
            Backend::Primary => &self.primary,
            Backend::Secondary => &self.secondary,
        };
        self.collaborators.progress.report(&ProgressEvent {
            task_id: self.task_id.clone(),
            backend,
            kind,
            iteration: counter.used(),
            max: self.settings.max_iterations,
            total: self.total_iterations(),
            elapsed: self.started.elapsed(),
        });
    }

    fn finish(self) -> LoopReport {
        let secondary = self.checker.as_ref().map(|_| BackendReport {
            passed: self.secondary_passed,
            iterations_used: self.secondary.used(),
            reboots: self.secondary_reboots,
            last_run: self.secondary_result.as_ref().map(|r| r.duration),
        });
        let passed = self.primary_passed && secondary.as_ref().is_none_or(|s| s.passed);

        let outcome = LoopOutcome {
            passed,
            primary: BackendReport {
                passed: self.primary_passed,
                iterations_used: self.primary.used(),
                reboots: self.primary_reboots,
                last_run: self.primary_result.as_ref().map(|r| r.duration),
            },
            secondary,
            escalations: self.escalations,
            usage: self.usage,
            elapsed: self.started.elapsed(),
        };
        log::info!(
            "[{}] debug loop finished: {} ({} iterations, {} escalations)",
            self.task_id,
            if passed { "passed" } else { "failed" },
            outcome.total_iterations(),
            outcome.escalations
        );

        LoopReport {
            outcome,
            testbench: self.testbench,
            checker: self.checker,
        }
    }
}
