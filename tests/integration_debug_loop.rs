//! Debug loop integration tests
//!
//! Drives the full primary/secondary loop and the batch pipeline with
//! scripted runners, repairer and regenerator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tbloop::checker::{Backend, RunResult};
use tbloop::debug::{Collaborators, DebugLoop, DebugSettings, LoopArtifacts, LoopReport, RollbackScope};
use tbloop::domain::{RunInfo, Task};
use tbloop::error::{Result, TbloopError};
use tbloop::generate::GeneratedArtifacts;
use tbloop::pipeline::{BatchRunner, PipelineSettings, TaskEnvironment, TaskServices};
use tbloop::progress::{ProgressKind, RecordingProgress};
use tbloop::testing::{FixedGenerator, ScriptedRegenerator, ScriptedRepairer, ScriptedRunner};
use tbloop::usage::UsageScope;
use tbloop::workspace::LoopWorkspace;
use tempfile::TempDir;

const TESTBENCH: &str = "module tb;\n  initial $finish;\nendmodule";
const CHECKER: &str = "class GoldenDUT:\n    pass\n";

struct Fixture {
    primary: Arc<ScriptedRunner>,
    secondary: Arc<ScriptedRunner>,
    repairer: Arc<ScriptedRepairer>,
    regenerator: Arc<ScriptedRegenerator>,
    progress: Arc<RecordingProgress>,
}

impl Fixture {
    fn new(primary: Vec<RunResult>, secondary: Vec<RunResult>) -> Self {
        Self {
            primary: Arc::new(ScriptedRunner::new(primary)),
            secondary: Arc::new(ScriptedRunner::new(secondary)),
            repairer: Arc::new(ScriptedRepairer::new()),
            regenerator: Arc::new(ScriptedRegenerator::new()),
            progress: Arc::new(RecordingProgress::new()),
        }
    }

    async fn run(&self, dir: &Path, checker: Option<&str>, settings: DebugSettings) -> Result<LoopReport> {
        let collaborators = Collaborators {
            primary_runner: self.primary.clone(),
            secondary_runner: self.secondary.clone(),
            repairer: self.repairer.clone(),
            regenerator: self.regenerator.clone(),
            progress: self.progress.clone(),
        };
        let artifacts = LoopArtifacts {
            testbench: TESTBENCH.to_string(),
            checker: checker.map(str::to_string),
            checker_focus: false,
        };
        DebugLoop::new("mux", artifacts, settings, collaborators, LoopWorkspace::new(dir))
            .run()
            .await
    }
}

fn trace(text: &str) -> RunResult {
    RunResult::passed_with("").with_trace(text)
}

fn settings(max: u32, reboot: u32, rollback: u32) -> DebugSettings {
    DebugSettings {
        max_iterations: max,
        reboot_threshold: reboot,
        rollback_threshold: rollback,
        ..Default::default()
    }
}

/// Primary passes at once with no checker: nothing is repaired
#[tokio::test]
async fn test_initial_pass_without_checker() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(vec![RunResult::passed_with("")], vec![]);

    let report = fixture.run(temp.path(), None, DebugSettings::default()).await?;

    assert!(report.outcome.passed);
    assert_eq!(report.outcome.primary.iterations_used, 0);
    assert!(report.outcome.secondary.is_none());
    assert_eq!(report.testbench, TESTBENCH);
    assert!(fixture.repairer.prompts().is_empty());
    assert!(fixture.secondary.requests().is_empty());
    Ok(())
}

/// One failure, fixed by the first debug iteration
#[tokio::test]
async fn test_single_debug_fixes_testbench() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(vec![RunResult::failed("tb.v:2: error"), RunResult::passed_with("")], vec![]);

    let report = fixture.run(temp.path(), None, settings(5, 3, 2)).await?;

    assert!(report.outcome.passed);
    assert_eq!(report.outcome.primary.iterations_used, 1);
    assert_eq!(report.outcome.primary.reboots, 0);
    assert!(fixture.regenerator.calls().is_empty());
    assert_eq!(report.testbench, "repair 1");
    Ok(())
}

/// After `reboot_threshold` debug iterations the testbench is regenerated
#[tokio::test]
async fn test_reboot_after_threshold_replaces_testbench() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(
        vec![
            RunResult::failed("e0"),
            RunResult::failed("e1"),
            RunResult::failed("e2"),
            RunResult::failed("e3"),
            RunResult::passed_with(""),
        ],
        vec![],
    );

    let report = fixture.run(temp.path(), None, settings(5, 3, 2)).await?;

    assert!(report.outcome.passed);
    assert_eq!(report.outcome.primary.iterations_used, 4);
    assert_eq!(report.outcome.primary.reboots, 1);
    assert_eq!(fixture.repairer.prompts().len(), 3);
    assert_eq!(report.testbench, "verilog reboot 1");

    let calls = fixture.regenerator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, Backend::Primary);
    assert!(calls[0].0.ends_with("debug_4_reboot"));
    assert_eq!(fixture.primary.requests()[4].source, "verilog reboot 1");
    assert_eq!(
        fixture.progress.kinds(Backend::Primary),
        vec![
            ProgressKind::InitialRun,
            ProgressKind::Debug,
            ProgressKind::Debug,
            ProgressKind::Debug,
            ProgressKind::Reboot,
            ProgressKind::Passed,
        ]
    );
    Ok(())
}

/// Debugging resumes after a reboot and the streak starts over
#[tokio::test]
async fn test_debug_streak_restarts_after_reboot() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(vec![], vec![]);

    let report = fixture.run(temp.path(), None, settings(7, 2, 2)).await?;

    assert!(!report.outcome.passed);
    assert_eq!(report.outcome.primary.iterations_used, 7);
    // debug, debug, reboot, debug, debug, reboot, debug
    assert_eq!(report.outcome.primary.reboots, 2);
    assert_eq!(fixture.repairer.prompts().len(), 5);
    for dir in ["debug_1", "debug_2", "debug_3_reboot", "debug_6_reboot", "debug_7"] {
        assert!(temp.path().join(dir).is_dir(), "missing {}", dir);
    }
    Ok(())
}

/// Checker failures past the rollback threshold reboot both artifacts
#[tokio::test]
async fn test_checker_failures_escalate_to_both_reboot() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(
        vec![trace("first trace"), trace("second trace")],
        vec![
            RunResult::failed("AssertionError"),
            RunResult::failed("AssertionError"),
            RunResult::passed_with("[]"),
        ],
    );

    let report = fixture.run(temp.path(), Some(CHECKER), settings(5, 3, 2)).await?;

    assert!(report.outcome.passed);
    assert_eq!(report.outcome.escalations, 1);
    assert_eq!(report.outcome.primary.iterations_used, 1);
    assert_eq!(report.outcome.primary.reboots, 1);
    let secondary = report.outcome.secondary.as_ref().expect("checker report");
    assert_eq!(secondary.iterations_used, 1);
    assert_eq!(secondary.reboots, 1);

    // the escalation's primary iteration is a reboot of both, in one directory
    let calls = fixture.regenerator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, Backend::Primary);
    assert_eq!(calls[1].1, Backend::Secondary);
    assert!(calls[0].0.ends_with("debug_2_reboot"));
    assert_eq!(calls[0].0, calls[1].0);
    assert_eq!(fixture.repairer.prompts().len(), 1);

    assert_eq!(report.testbench, "verilog reboot 1");
    assert_eq!(report.checker.as_deref(), Some("python reboot 2"));

    let checker_runs = fixture.secondary.requests();
    assert_eq!(checker_runs.len(), 3);
    assert_eq!(checker_runs[2].source, "python reboot 2");
    assert_eq!(checker_runs[2].input.as_deref(), Some("second trace"));
    assert!(checker_runs[2].work_dir.ends_with("debug_2_reboot"));

    assert_eq!(
        fixture.progress.kinds(Backend::Primary),
        vec![
            ProgressKind::InitialRun,
            ProgressKind::Passed,
            ProgressKind::Reboot,
            ProgressKind::Passed,
        ]
    );
    assert!(fixture.progress.kinds(Backend::Secondary).contains(&ProgressKind::Escalated));
    Ok(())
}

/// Escalation after the testbench budget is spent ends the loop
#[tokio::test]
async fn test_escalation_with_spent_testbench_budget() -> Result<()> {
    let temp = TempDir::new()?;
    let fixture = Fixture::new(
        vec![RunResult::failed("e"), trace("t")],
        vec![RunResult::failed("AssertionError")],
    );

    let report = fixture.run(temp.path(), Some(CHECKER), settings(1, 3, 1)).await?;

    assert!(!report.outcome.passed);
    assert!(!report.outcome.primary.passed);
    assert_eq!(report.outcome.escalations, 1);
    assert_eq!(report.outcome.primary.iterations_used, 1);
    assert!(fixture.regenerator.calls().is_empty());
    assert_eq!(fixture.primary.requests().len(), 2);
    Ok(())
}

/// A persistent rollback counter escalates again on the first failure after re-entry
#[tokio::test]
async fn test_rollback_scope() -> Result<()> {
    let checker_runs = || {
        vec![
            RunResult::failed("AssertionError"),
            RunResult::failed("AssertionError"),
            RunResult::failed("AssertionError"),
            RunResult::passed_with("[]"),
        ]
    };
    let testbench_runs = || vec![trace("t1"), trace("t2"), trace("t3")];

    let temp = TempDir::new()?;
    let fixture = Fixture::new(testbench_runs(), checker_runs());
    let report = fixture.run(temp.path(), Some(CHECKER), settings(5, 3, 2)).await?;
    assert!(report.outcome.passed);
    assert_eq!(report.outcome.escalations, 1);
    assert_eq!(fixture.regenerator.calls().len(), 2);

    let temp = TempDir::new()?;
    let fixture = Fixture::new(testbench_runs(), checker_runs());
    let persistent = DebugSettings {
        rollback_scope: RollbackScope::Persistent,
        ..settings(5, 3, 2)
    };
    let report = fixture.run(temp.path(), Some(CHECKER), persistent).await?;
    assert!(report.outcome.passed);
    assert_eq!(report.outcome.escalations, 2);
    assert_eq!(fixture.regenerator.calls().len(), 4);
    assert!(temp.path().join("debug_3_reboot").is_dir());
    Ok(())
}

/// Timeouts reach the next prompt in full and leave no partial output behind
#[tokio::test]
async fn test_timeout_diagnostic_is_unabridged() -> Result<()> {
    let temp = TempDir::new()?;
    let mut hung_checker = RunResult::timed_out(Duration::from_secs(60));
    hung_checker.stdout = "Passed; vector: {}\n".repeat(1000);
    let hung_testbench = RunResult::timed_out(Duration::from_secs(60)).with_trace("scenario: 1, a = 0");

    let fixture = Fixture::new(
        vec![hung_testbench, trace("scenario: 1, a = 1")],
        vec![hung_checker, RunResult::passed_with("[]")],
    );
    let report = fixture
        .run(
            temp.path(),
            Some(CHECKER),
            DebugSettings {
                error_depth: 1,
                ..Default::default()
            },
        )
        .await?;

    assert!(report.outcome.passed);
    let prompts = fixture.repairer.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("program is timeout after 60s"));
    assert!(prompts[1].contains("program is timeout after 60s"));
    assert!(!prompts[1].contains("Passed; vector"));

    let output = std::fs::read_to_string(temp.path().join("debug_1").join("run_output.txt"))?;
    assert!(!output.contains("Passed; vector"));
    assert_eq!(fixture.secondary.requests()[0].input.as_deref(), Some("scenario: 1, a = 1"));
    Ok(())
}

/// Tiny deterministic generator for run sequences
struct Lcg(u64);

impl Lcg {
    fn next_bool(&mut self) -> bool {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % 3 == 0
    }

    fn results(&mut self, len: usize) -> Vec<RunResult> {
        (0..len)
            .map(|_| {
                if self.next_bool() {
                    trace("t")
                } else {
                    RunResult::failed("e")
                }
            })
            .collect()
    }
}

/// Counters stay within their budgets for arbitrary pass/fail sequences
#[tokio::test]
async fn test_counters_bounded_for_any_sequence() -> Result<()> {
    let mut rng = Lcg(7);
    for seed in 0..60u32 {
        let max = 1 + seed % 6;
        let reboot = seed % 4;
        let rollback = 1 + seed % 3;
        let scope = if seed % 2 == 0 {
            RollbackScope::PerEntry
        } else {
            RollbackScope::Persistent
        };
        let temp = TempDir::new()?;
        let fixture = Fixture::new(rng.results(30), rng.results(30));
        let settings = DebugSettings {
            rollback_scope: scope,
            ..settings(max, reboot, rollback)
        };

        let report = fixture.run(temp.path(), Some(CHECKER), settings).await?;
        let outcome = &report.outcome;
        let secondary = outcome.secondary.as_ref().expect("checker report");

        assert!(outcome.primary.iterations_used <= max, "seed {}", seed);
        assert!(secondary.iterations_used <= max, "seed {}", seed);
        assert!(outcome.total_iterations() <= 2 * max, "seed {}", seed);
        // only an escalation that meets a spent budget skips the forced reboot
        assert!(outcome.escalations <= max + 1, "seed {}", seed);
        assert_eq!(outcome.passed, outcome.primary.passed && secondary.passed, "seed {}", seed);
    }
    Ok(())
}

/// Environment whose runners pass every task except `flaky`, which never passes
struct ScriptedEnvironment;

impl TaskEnvironment for ScriptedEnvironment {
    fn prepare(&self, task: &Task) -> Result<TaskServices> {
        let primary = if task.task_id == "flaky" {
            ScriptedRunner::new(vec![])
        } else {
            ScriptedRunner::new(vec![RunResult::failed("e")]).with_fallback(trace("t"))
        };
        Ok(TaskServices {
            generator: Arc::new(FixedGenerator {
                artifacts: GeneratedArtifacts {
                    testbench: TESTBENCH.to_string(),
                    checker: Some(CHECKER.to_string()),
                    checker_focus: false,
                    circuit_type: Some("SEQ".to_string()),
                },
            }),
            collaborators: Collaborators {
                primary_runner: Arc::new(primary),
                secondary_runner: Arc::new(ScriptedRunner::new(vec![]).with_fallback(RunResult::passed_with("[]"))),
                repairer: Arc::new(ScriptedRepairer::new()),
                regenerator: Arc::new(ScriptedRegenerator::new()),
                progress: Arc::new(RecordingProgress::new()),
            },
            usage: UsageScope::detached(),
        })
    }
}

#[tokio::test]
async fn test_batch_pipeline_end_to_end() -> Result<()> {
    let temp = TempDir::new()?;
    let settings = PipelineSettings {
        save_root: temp.path().to_path_buf(),
        concurrency: 2,
        max_rounds: 2,
        debug: settings(2, 3, 2),
        ..Default::default()
    };
    let runner = BatchRunner::new(settings, Arc::new(ScriptedEnvironment))?;
    let tasks = ["mux", "flaky", "counter"]
        .iter()
        .map(|id| Task::new(*id, "d", "h"))
        .collect();

    let summary = runner.run(tasks).await?;
    assert_eq!((summary.passed, summary.total), (2, 3));

    let saved: Vec<RunInfo> = serde_json::from_str(&std::fs::read_to_string(&summary.results_path)?)?;
    let flaky = saved.iter().find(|r| r.task_id == "flaky").expect("flaky record");
    assert_eq!(flaky.reboot_times, 1);
    assert_eq!(flaky.op_record, vec!["gen", "syncheck", "gen", "syncheck"]);
    assert_eq!(flaky.debug_iter_iv, Some(2));

    let mux = saved.iter().find(|r| r.task_id == "mux").expect("mux record");
    assert_eq!(mux.debug_iter_iv, Some(1));
    assert_eq!(mux.eval0_py_pass, Some(true));
    assert_eq!(mux.circuit_type.as_deref(), Some("SEQ"));
    // scripted repairs are not recorded in the task's usage scope
    assert_eq!(mux.prompt_tokens, 0);

    let mux_dir = temp.path().join("mux");
    assert!(mux_dir.join("1_2_sim").join("debug_1").is_dir());
    assert!(mux_dir.join("final_TB.py").exists());
    assert!(!mux_dir.join("2_2_sim").exists());
    Ok(())
}

#[test]
fn test_error_display() {
    let e = TbloopError::Runner("iverilog not found".to_string());
    assert_eq!(e.to_string(), "Runner error: iverilog not found");
}
