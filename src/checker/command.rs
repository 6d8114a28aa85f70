// Subprocess execution with a hard timeout, shared by the checker backends

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::{Result, TbloopError};

/// Captured result of one subprocess
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    /// stderr followed by stdout, skipping empty parts
    pub fn combined(&self) -> String {
        [self.stderr.trim_end(), self.stdout.trim_end()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run `program args..` in `cwd`, killing it once `timeout` elapses.
///
/// Failing to spawn the program is an invocation error; a non-zero exit or a
/// timeout is reported in the returned output.
pub async fn run_command(program: &str, args: &[String], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let child = cmd
        .spawn()
        .map_err(|e| TbloopError::Runner(format!("failed to start {}: {}", program, e)))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output.map_err(|e| TbloopError::Runner(format!("{} did not complete: {}", program, e)))?;
            Ok(CommandOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                timed_out: false,
                duration: started.elapsed(),
            })
        }
        Err(_) => {
            log::warn!("{} timed out after {}s in {}", program, timeout.as_secs(), cwd.display());
            Ok(CommandOutput {
                timed_out: true,
                duration: started.elapsed(),
                ..Default::default()
            })
        }
    }
}
