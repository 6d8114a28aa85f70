//! Batch result collection, rewritten to disk after every append.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::RunInfo;
use crate::error::{Result, TbloopError};

/// Results of every finished task in a batch.
///
/// Appends from concurrent workers are serialized by one lock, and the file
/// is rewritten while it is held, so a crash loses at most the task in flight.
pub struct ResultStore {
    path: PathBuf,
    records: Mutex<Vec<RunInfo>>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, info: RunInfo) -> Result<()> {
        let mut records = self.records.lock().map_err(|e| TbloopError::Storage(e.to_string()))?;
        records.push(info);
        let json = serde_json::to_string_pretty(&*records)?;
        fs::write(&self.path, json)
            .map_err(|e| TbloopError::Storage(format!("Failed to write {}: {}", self.path.display(), e)))?;
        Ok(())
    }

    pub fn records(&self) -> Vec<RunInfo> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// (passed, total)
    pub fn pass_count(&self) -> (usize, usize) {
        let records = self.records();
        (records.iter().filter(|r| r.passed()).count(), records.len())
    }
}

/// Write one record as pretty JSON
pub fn save_run_info(path: &Path, info: &RunInfo) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(info)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn info(id: &str, passed: bool) -> RunInfo {
        let mut info = RunInfo::new(&Task::new(id, "d", "h"), 1);
        info.eval0_pass = Some(passed);
        info
    }

    #[test]
    fn test_file_rewritten_after_each_append() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("out").join("run_info.json")).unwrap();

        store.append(info("a", true)).unwrap();
        let first: Vec<RunInfo> = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(first.len(), 1);

        store.append(info("b", false)).unwrap();
        let second: Vec<RunInfo> = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(store.pass_count(), (1, 2));
    }

    #[test]
    fn test_concurrent_appends() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ResultStore::new(temp.path().join("run_info.json")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.append(info(&format!("t{}", i), i % 2 == 0)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk: Vec<RunInfo> = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 8);
        assert_eq!(store.pass_count(), (4, 8));
    }

    #[test]
    fn test_save_run_info() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run_info.json");
        save_run_info(&path, &info("mux", true)).unwrap();
        let back: RunInfo = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.task_id, "mux");
    }
}
