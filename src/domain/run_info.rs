//! Per-task result record persisted as `run_info.json` and in the batch results file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::debug::LoopOutcome;
use crate::usage::UsageTotals;

/// Stage names recorded in `op_record`
pub const OP_GEN: &str = "gen";
pub const OP_SYNCHECK: &str = "syncheck";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub task_id: String,
    pub task_number: Option<u32>,
    /// Wall-clock seconds spent on the task
    pub time: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub token_cost: f64,
    /// A stage ended in an invocation error
    pub incomplete: bool,
    pub op_record: Vec<String>,
    /// Rounds started after the first one
    pub reboot_times: u32,
    pub max_rounds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_type: Option<String>,

    /// Overall validation result of the last loop
    pub eval0_pass: Option<bool>,
    pub eval0_iv_pass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval0_py_pass: Option<bool>,
    pub debug_iter_iv: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_iter_py: Option<u32>,
    /// Seconds of the last simulator run
    pub iv_running_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub py_running_time: Option<f64>,
    pub escalations: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RunInfo {
    pub fn new(task: &Task, max_rounds: u32) -> Self {
        Self {
            task_id: task.task_id.clone(),
            task_number: task.task_number,
            time: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            token_cost: 0.0,
            incomplete: false,
            op_record: Vec::new(),
            reboot_times: 0,
            max_rounds,
            circuit_type: None,
            eval0_pass: None,
            eval0_iv_pass: None,
            eval0_py_pass: None,
            debug_iter_iv: None,
            debug_iter_py: None,
            iv_running_time: None,
            py_running_time: None,
            escalations: 0,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Fold the result of one debug loop into the record
    pub fn record_loop(&mut self, outcome: &LoopOutcome) {
        self.eval0_pass = Some(outcome.passed);
        self.eval0_iv_pass = Some(outcome.primary.passed);
        self.debug_iter_iv = Some(outcome.primary.iterations_used);
        self.iv_running_time = outcome.primary.last_run.map(|d| d.as_secs_f64());
        match &outcome.secondary {
            Some(secondary) => {
                self.eval0_py_pass = Some(secondary.passed);
                self.debug_iter_py = Some(secondary.iterations_used);
                self.py_running_time = secondary.last_run.map(|d| d.as_secs_f64());
            }
            None => {
                self.eval0_py_pass = None;
                self.debug_iter_py = None;
                self.py_running_time = None;
            }
        }
        self.escalations += outcome.escalations;
    }

    pub fn record_usage(&mut self, usage: &UsageTotals) {
        self.prompt_tokens = usage.prompt_tokens;
        self.completion_tokens = usage.completion_tokens;
        self.token_cost = usage.cost_usd;
    }

    pub fn passed(&self) -> bool {
        self.eval0_pass == Some(true)
    }
}
