//! Batch pipeline: per-task rounds of generation and validation, run for
//! many tasks with bounded parallelism.

pub mod batch;
pub mod task;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::debug::DebugSettings;

pub use batch::{BatchRunner, BatchSummary, LiveEnvironment, TaskEnvironment, TaskServices};
pub use task::{StageResult, TaskPipeline};

/// What a fatal stage error does to the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Mark the task incomplete and move on
    #[default]
    Continue,
    /// Stop the whole batch
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_rounds: u32,
    pub error_policy: ErrorPolicy,
    /// Run the behavioral checker
    pub secondary: bool,
    pub save_final_codes: bool,
    pub concurrency: usize,
    pub save_root: PathBuf,
    pub results_file: String,
    pub debug: DebugSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_rounds: 1,
            error_policy: ErrorPolicy::Continue,
            secondary: true,
            save_final_codes: true,
            concurrency: 1,
            save_root: PathBuf::from("./runs"),
            results_file: "run_info.json".to_string(),
            debug: DebugSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn results_path(&self) -> PathBuf {
        self.save_root.join(&self.results_file)
    }
}
