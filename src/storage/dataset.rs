//! JSONL dataset loading

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::Task;
use crate::error::{Result, TbloopError};

/// Read one task per non-empty line.
pub fn load_dataset(path: &Path) -> Result<Vec<Task>> {
    let file = File::open(path)
        .map_err(|e| TbloopError::Dataset(format!("Failed to open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut tasks = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(&line)
            .map_err(|e| TbloopError::Dataset(format!("{}:{}: {}", path.display(), number + 1, e)))?;
        tasks.push(task);
    }
    log::info!("Loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

/// Keep the tasks named by id or number, in dataset order. An empty
/// selection keeps everything.
pub fn select_tasks(tasks: Vec<Task>, keys: &[String]) -> Result<Vec<Task>> {
    if keys.is_empty() {
        return Ok(tasks);
    }
    if let Some(missing) = keys.iter().find(|k| !tasks.iter().any(|t| t.matches(k))) {
        return Err(TbloopError::Dataset(format!("Task {} not found in dataset", missing)));
    }
    Ok(tasks
        .into_iter()
        .filter(|t| keys.iter().any(|k| t.matches(k)))
        .collect())
}
