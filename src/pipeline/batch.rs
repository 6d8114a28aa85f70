//! Batch execution over a task list with bounded parallelism.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use futures::stream;

use crate::checker::{IverilogRunner, PythonRunner};
use crate::debug::Collaborators;
use crate::domain::{RunInfo, Task};
use crate::error::Result;
use crate::generate::{Generator, LlmGenerator};
use crate::llm::LlmClient;
use crate::progress::ProgressSink;
use crate::repair::LlmRepairer;
use crate::storage::ResultStore;
use crate::usage::{UsageLedger, UsageScope};

use super::task::TaskPipeline;
use super::{ErrorPolicy, PipelineSettings};

/// Everything one task needs, built fresh per task
pub struct TaskServices {
    pub generator: Arc<dyn Generator>,
    pub collaborators: Collaborators,
    /// Usage of this task only
    pub usage: Arc<UsageScope>,
}

/// Builds the per-task services
pub trait TaskEnvironment: Send + Sync {
    fn prepare(&self, task: &Task) -> Result<TaskServices>;
}

/// Environment backed by a model, Icarus Verilog and a Python interpreter
pub struct LiveEnvironment {
    client: Arc<dyn LlmClient>,
    ledger: Arc<UsageLedger>,
    progress: Arc<dyn ProgressSink>,
    iverilog: String,
    vvp: String,
    python: String,
    max_tokens: u32,
    temperature: Option<f32>,
    with_checker: bool,
}

impl LiveEnvironment {
    pub fn new(client: Arc<dyn LlmClient>, ledger: Arc<UsageLedger>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            client,
            ledger,
            progress,
            iverilog: "iverilog".to_string(),
            vvp: "vvp".to_string(),
            python: "python3".to_string(),
            max_tokens: 8192,
            temperature: None,
            with_checker: true,
        }
    }

    pub fn with_executables(
        mut self,
        iverilog: impl Into<String>,
        vvp: impl Into<String>,
        python: impl Into<String>,
    ) -> Self {
        self.iverilog = iverilog.into();
        self.vvp = vvp.into();
        self.python = python.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_checker(mut self, enabled: bool) -> Self {
        self.with_checker = enabled;
        self
    }
}

impl TaskEnvironment for LiveEnvironment {
    fn prepare(&self, task: &Task) -> Result<TaskServices> {
        let usage = self.ledger.scope();
        let generator = Arc::new(
            LlmGenerator::new(self.client.clone(), usage.clone(), task.clone())
                .with_checker(self.with_checker)
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature),
        );
        let repairer = LlmRepairer::new(self.client.clone(), usage.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        Ok(TaskServices {
            collaborators: Collaborators {
                primary_runner: Arc::new(
                    IverilogRunner::new(&self.iverilog, &self.vvp).with_dut_header(&task.header),
                ),
                secondary_runner: Arc::new(PythonRunner::new(&self.python)),
                repairer: Arc::new(repairer),
                regenerator: generator.clone(),
                progress: self.progress.clone(),
            },
            generator,
            usage,
        })
    }
}

/// Totals of a finished batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub passed: usize,
    pub total: usize,
    pub incomplete: usize,
    pub results_path: PathBuf,
}

/// Runs tasks concurrently and collects their records
pub struct BatchRunner {
    settings: PipelineSettings,
    environment: Arc<dyn TaskEnvironment>,
    store: Arc<ResultStore>,
}

impl BatchRunner {
    pub fn new(settings: PipelineSettings, environment: Arc<dyn TaskEnvironment>) -> Result<Self> {
        let store = Arc::new(ResultStore::new(settings.results_path())?);
        Ok(Self {
            settings,
            environment,
            store,
        })
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run every task, at most `concurrency` at a time.
    ///
    /// Under the `abort` policy the first fatal error is returned. No task
    /// starts after it; tasks already in flight still finish.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<BatchSummary> {
        let total = tasks.len();
        let concurrency = self.settings.concurrency.max(1);
        log::info!("Running {} tasks ({} at a time)", total, concurrency);

        let aborted = AtomicBool::new(false);
        let mut results = stream::iter(tasks)
            .map(|task| self.run_one(task, &aborted))
            .buffer_unordered(concurrency);

        let mut first_error = None;
        while let Some(result) = results.next().await {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let records = self.store.records();
        let (passed, total) = self.store.pass_count();
        Ok(BatchSummary {
            passed,
            total,
            incomplete: records.iter().filter(|r| r.incomplete).count(),
            results_path: self.store.path().to_path_buf(),
        })
    }

    async fn run_one(&self, task: Task, aborted: &AtomicBool) -> Result<()> {
        if aborted.load(Ordering::SeqCst) {
            log::info!("[{}] skipped: batch aborted", task.task_id);
            return Ok(());
        }

        let info = match self.environment.prepare(&task) {
            Ok(services) => TaskPipeline::new(&task, &self.settings, services).run().await,
            Err(e) => Err(e),
        };

        let info = match info {
            Ok(info) => info,
            Err(e) if self.settings.error_policy == ErrorPolicy::Abort => {
                aborted.store(true, Ordering::SeqCst);
                log::error!("[{}] aborting batch: {}", task.task_id, e);
                return Err(e);
            }
            Err(e) => {
                log::error!("[{}] task failed: {}", task.task_id, e);
                let mut info = RunInfo::new(&task, self.settings.max_rounds);
                info.incomplete = true;
                info.error = Some(e.to_string());
                info
            }
        };

        log::info!(
            "[{}] finished: {} in {:.1}s",
            task.task_id,
            if info.passed() { "passed" } else { "failed" },
            info.time
        );
        self.store.append(info)
    }
}
