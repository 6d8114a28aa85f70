//! Dataset task record

use serde::{Deserialize, Serialize};

/// One problem from the dataset: the circuit to write a testbench for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,

    #[serde(default)]
    pub task_number: Option<u32>,

    /// Natural-language problem description
    pub description: String,

    /// Module header of the device under test
    pub header: String,

    /// Reference implementation, when the dataset carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_code: Option<String>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, description: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_number: None,
            description: description.into(),
            header: header.into(),
            module_code: None,
        }
    }

    /// Whether `key` names this task by id or by number
    pub fn matches(&self, key: &str) -> bool {
        self.task_id == key || self.task_number.is_some_and(|n| n.to_string() == key)
    }
}
