//! Scripted collaborators for driving the debug loop without a simulator,
//! an interpreter or a model.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checker::{ArtifactRunner, Backend, RunRequest, RunResult};
use crate::error::{Result, TbloopError};
use crate::generate::{GeneratedArtifacts, Generator, RegenerationSource};
use crate::llm::{Message, Usage};
use crate::repair::{RepairReply, RepairRequest, RepairRequester};

/// Usage reported by every scripted repair
pub const SCRIPTED_REPAIR_USAGE: Usage = Usage {
    input_tokens: 10,
    output_tokens: 5,
};

/// Runner that replays queued results, then keeps failing
pub struct ScriptedRunner {
    results: Mutex<VecDeque<RunResult>>,
    fallback: RunResult,
    requests: Mutex<Vec<RunRequest>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<RunResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            fallback: RunResult::failed("scripted failure"),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Result returned once the queue is drained
    pub fn with_fallback(mut self, fallback: RunResult) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactRunner for ScriptedRunner {
    async fn run(&self, request: RunRequest) -> Result<RunResult> {
        self.requests
            .lock()
            .map_err(|e| TbloopError::Runner(e.to_string()))?
            .push(request);
        let next = self
            .results
            .lock()
            .map_err(|e| TbloopError::Runner(e.to_string()))?
            .pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }

    fn description(&self) -> &str {
        "scripted"
    }
}

/// Repairer that replays queued code, then answers `repair <n>`
#[derive(Default)]
pub struct ScriptedRepairer {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl ScriptedRepairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repairer whose every call is an invocation error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn push(&self, code: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(code.into());
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RepairRequester for ScriptedRepairer {
    async fn repair(&self, request: RepairRequest) -> Result<RepairReply> {
        if self.fail {
            return Err(TbloopError::Repair("scripted repair failure".to_string()));
        }
        let count = {
            let mut prompts = self.prompts.lock().map_err(|e| TbloopError::Repair(e.to_string()))?;
            prompts.push(request.prompt.clone());
            prompts.len()
        };
        let code = self
            .replies
            .lock()
            .map_err(|e| TbloopError::Repair(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| format!("repair {}", count));

        Ok(RepairReply {
            transcript: vec![Message::user(request.prompt), Message::assistant(&code)],
            code,
            usage: SCRIPTED_REPAIR_USAGE,
        })
    }
}

/// Regenerator that answers `<backend> reboot <n>` and records every call
#[derive(Default)]
pub struct ScriptedRegenerator {
    calls: Mutex<Vec<(PathBuf, Backend)>>,
}

impl ScriptedRegenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(PathBuf, Backend)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RegenerationSource for ScriptedRegenerator {
    async fn reboot(&self, work_dir: &Path, backend: Backend) -> Result<String> {
        let mut calls = self.calls.lock().map_err(|e| TbloopError::Regeneration(e.to_string()))?;
        calls.push((work_dir.to_path_buf(), backend));
        Ok(format!("{} reboot {}", backend, calls.len()))
    }
}

/// Generator returning the same artifacts every time
#[derive(Debug, Clone, Default)]
pub struct FixedGenerator {
    pub artifacts: GeneratedArtifacts,
}

#[async_trait]
impl Generator for FixedGenerator {
    async fn generate(&self, work_dir: &Path) -> Result<GeneratedArtifacts> {
        tokio::fs::create_dir_all(work_dir).await?;
        Ok(self.artifacts.clone())
    }
}
