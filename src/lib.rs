//! tbloop - LLM-driven testbench generation and validation.
//!
//! A generated Verilog testbench is validated with a simulator; a generated
//! Python checker then judges the trace the testbench produced. Failing
//! artifacts are repaired by the model with a budget of debug iterations,
//! regenerated from scratch after too many repairs, and both are rebooted
//! together when the checker keeps failing against a passing testbench.

pub mod checker;
pub mod debug;
pub mod domain;
pub mod error;
pub mod generate;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod repair;
pub mod storage;
pub mod testing;
pub mod usage;
pub mod workspace;

pub use error::{Result, TbloopError};
