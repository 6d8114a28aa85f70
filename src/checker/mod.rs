// Checker backends: the simulator (primary) and the script interpreter (secondary)

pub mod command;
pub mod iverilog;
pub mod python;
pub mod traits;

pub use command::{CommandOutput, run_command};
pub use iverilog::IverilogRunner;
pub use python::PythonRunner;
pub use traits::{ArtifactRunner, RunRequest, RunResult, RunStatus, timeout_message};

use serde::{Deserialize, Serialize};

/// Signal trace the testbench writes and the checker reads
pub const TRACE_FILE: &str = "TBout.txt";

/// Which checker an artifact is validated by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Simulator compile/run check of the testbench
    Primary,
    /// Interpreter behavioral check of the checker script
    Secondary,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Primary => "verilog",
            Backend::Secondary => "python",
        }
    }

    /// Fenced code language tag for artifacts of this backend
    pub fn language(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Testbench file name for a task
pub fn testbench_file(task_id: &str) -> String {
    format!("{}_tb.v", task_id)
}

/// DUT stub file name for a task
pub fn dut_file(task_id: &str) -> String {
    format!("{}.v", task_id)
}

/// Checker script file name for a task
pub fn checker_file(task_id: &str) -> String {
    format!("{}_tb.py", task_id)
}
