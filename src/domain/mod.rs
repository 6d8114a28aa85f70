//! Domain records
//!
//! - Task: one dataset problem
//! - RunInfo: what happened to a task, persisted per task and per batch

pub mod run_info;
pub mod task;

pub use run_info::{OP_GEN, OP_SYNCHECK, RunInfo};
pub use task::Task;
