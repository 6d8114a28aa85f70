//! Per-task directory trees.
//!
//! A task owns `<save-root>/<task_id>/`, which is never shared with another
//! task, so nothing in here needs cross-task locking. Inside a round the debug
//! loop gets its own [`LoopWorkspace`] where every debug or reboot iteration
//! is materialised in a numbered subdirectory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checker::RunResult;
use crate::error::{Result, TbloopError};
use crate::llm::Message;

/// Transcript of the LLM exchange that produced an iteration's artifact
pub const TRANSCRIPT_FILE: &str = "debug_messages.txt";

/// Status, stdout and diagnostic of the run in an iteration directory
pub const RUN_OUTPUT_FILE: &str = "run_output.txt";

/// Layout of one task's output tree
#[derive(Debug, Clone)]
pub struct TaskLayout {
    root: PathBuf,
}

impl TaskLayout {
    pub fn new(save_root: &Path, task_id: &str) -> Self {
        Self {
            root: save_root.join(task_id),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generation directory of a round (1-based)
    pub fn gen_dir(&self, round: u32) -> PathBuf {
        self.root.join(format!("{}_1_gen", round))
    }

    /// Simulation/debug directory of a round (1-based)
    pub fn sim_dir(&self, round: u32) -> PathBuf {
        self.root.join(format!("{}_2_sim", round))
    }

    pub fn run_info_path(&self) -> PathBuf {
        self.root.join("run_info.json")
    }

    pub fn final_testbench_path(&self) -> PathBuf {
        self.root.join("final_TB.v")
    }

    pub fn final_checker_path(&self) -> PathBuf {
        self.root.join("final_TB.py")
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| TbloopError::Storage(format!("Failed to create {}: {}", self.root.display(), e)))
    }
}

/// Working tree of one debug loop invocation
#[derive(Debug, Clone)]
pub struct LoopWorkspace {
    root: PathBuf,
}

impl LoopWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of the initial run
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory for debug/reboot iteration `total`.
    ///
    /// `total` counts the iterations of both backends, so every iteration in
    /// one loop gets a distinct directory.
    pub fn iteration_dir(&self, total: u32, reboot: bool) -> Result<PathBuf> {
        let name = if reboot {
            format!("debug_{}_reboot", total)
        } else {
            format!("debug_{}", total)
        };
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)
            .map_err(|e| TbloopError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    pub fn write_transcript(&self, dir: &Path, messages: &[Message]) -> Result<()> {
        fs::write(dir.join(TRANSCRIPT_FILE), format_transcript(messages))?;
        Ok(())
    }

    pub fn write_run_output(&self, dir: &Path, label: &str, result: &RunResult) -> Result<()> {
        let text = format!(
            "[{}] status: {:?} ({:.2}s)\n--- stdout ---\n{}\n--- diagnostic ---\n{}\n",
            label,
            result.status,
            result.duration.as_secs_f64(),
            result.stdout,
            result.diagnostic
        );
        let path = dir.join(RUN_OUTPUT_FILE);
        let existing = fs::read_to_string(&path).unwrap_or_default();
        fs::write(path, existing + &text)?;
        Ok(())
    }

    /// Remove waveform dumps left anywhere under the workspace
    pub fn clean_waveforms(&self) -> Result<usize> {
        remove_matching(&self.root, "vcd")
    }
}

/// Render a transcript as readable text
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("########## {} ##########\n{}\n", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_matching(root: &Path, extension: &str) -> Result<usize> {
    let pattern = format!("{}/**/*.{}", root.display(), extension);
    let paths = glob::glob(&pattern).map_err(|e| TbloopError::Storage(format!("Bad pattern {}: {}", pattern, e)))?;

    let mut removed = 0;
    for entry in paths {
        match entry {
            Ok(path) => {
                fs::remove_file(&path)?;
                removed += 1;
            }
            Err(e) => log::warn!("Skipping unreadable path: {}", e),
        }
    }
    if removed > 0 {
        log::debug!("Removed {} .{} files under {}", removed, extension, root.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::RunResult;
    use tempfile::TempDir;

    #[test]
    fn test_task_layout() {
        let layout = TaskLayout::new(Path::new("/runs"), "mux");
        assert_eq!(layout.gen_dir(1), PathBuf::from("/runs/mux/1_1_gen"));
        assert_eq!(layout.sim_dir(2), PathBuf::from("/runs/mux/2_2_sim"));
        assert_eq!(layout.run_info_path(), PathBuf::from("/runs/mux/run_info.json"));
        assert_eq!(layout.final_testbench_path(), PathBuf::from("/runs/mux/final_TB.v"));
        assert_eq!(layout.final_checker_path(), PathBuf::from("/runs/mux/final_TB.py"));
    }

    #[test]
    fn test_iteration_dirs_are_distinct() {
        let temp = TempDir::new().unwrap();
        let ws = LoopWorkspace::new(temp.path());

        let debug = ws.iteration_dir(1, false).unwrap();
        let reboot = ws.iteration_dir(2, true).unwrap();

        assert!(debug.ends_with("debug_1"));
        assert!(reboot.ends_with("debug_2_reboot"));
        assert!(debug.is_dir());
        assert!(reboot.is_dir());
    }

    #[test]
    fn test_transcript_and_run_output() {
        let temp = TempDir::new().unwrap();
        let ws = LoopWorkspace::new(temp.path());
        let dir = ws.iteration_dir(1, false).unwrap();

        ws.write_transcript(&dir, &[Message::user("fix it"), Message::assistant("```verilog\n```")])
            .unwrap();
        ws.write_run_output(&dir, "verilog", &RunResult::failed("syntax error")).unwrap();
        ws.write_run_output(&dir, "python", &RunResult::passed_with("ok")).unwrap();

        let transcript = fs::read_to_string(dir.join(TRANSCRIPT_FILE)).unwrap();
        assert!(transcript.contains("########## user ##########\nfix it"));
        assert!(transcript.contains("assistant"));

        let output = fs::read_to_string(dir.join(RUN_OUTPUT_FILE)).unwrap();
        assert!(output.contains("[verilog] status: Failed"));
        assert!(output.contains("syntax error"));
        assert!(output.contains("[python] status: Passed"));
    }

    #[test]
    fn test_clean_waveforms() {
        let temp = TempDir::new().unwrap();
        let ws = LoopWorkspace::new(temp.path());
        let dir = ws.iteration_dir(3, false).unwrap();
        fs::write(temp.path().join("wave.vcd"), "").unwrap();
        fs::write(dir.join("nested.vcd"), "").unwrap();
        fs::write(dir.join("mux_tb.v"), "").unwrap();

        assert_eq!(ws.clean_waveforms().unwrap(), 2);
        assert!(!dir.join("nested.vcd").exists());
        assert!(dir.join("mux_tb.v").exists());
    }
}
