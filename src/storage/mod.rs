//! Persistence: the JSONL dataset on the way in, JSON results on the way out.

pub mod dataset;
pub mod results;

pub use dataset::{load_dataset, select_tasks};
pub use results::{ResultStore, save_run_info};
