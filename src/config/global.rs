//! Global configuration.
//!
//! Loaded from ~/.config/tbloop/tbloop.yml or .tbloop.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tbloop::debug::{DebugSettings, RollbackScope};
use tbloop::llm::ClientConfig;
use tbloop::pipeline::{ErrorPolicy, PipelineSettings};

/// Global configuration for tbloop.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// LLM provider settings.
    pub llm: LlmConfig,

    /// Debug loop budgets.
    pub debug: DebugConfig,

    /// Checker executables and timeout.
    pub checker: CheckerConfig,

    /// Batch pipeline settings.
    pub pipeline: PipelineConfig,

    /// Output locations.
    pub storage: StorageConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .tbloop.yml in current directory
    /// 3. ~/.config/tbloop/tbloop.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".tbloop.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .tbloop.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .tbloop.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tbloop").join("tbloop.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.debug.max == 0 {
            eyre::bail!("debug.max must be > 0");
        }
        if self.debug.py_rollback == 0 {
            eyre::bail!("debug.py-rollback must be > 0");
        }
        if self.checker.timeout_secs == 0 {
            eyre::bail!("checker.timeout-secs must be > 0");
        }
        if self.pipeline.concurrency == 0 {
            eyre::bail!("pipeline.concurrency must be > 0");
        }
        if self.pipeline.max_rounds == 0 {
            eyre::bail!("pipeline.max-rounds must be > 0");
        }
        if self.llm.max_tokens == 0 {
            eyre::bail!("llm.max-tokens must be > 0");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            temperature: self.llm.temperature,
            api_key_env: self.llm.api_key_env.clone(),
        }
    }

    pub fn debug_settings(&self) -> DebugSettings {
        DebugSettings {
            max_iterations: self.debug.max,
            reboot_threshold: self.debug.reboot,
            rollback_threshold: self.debug.py_rollback,
            rollback_scope: self.debug.rollback_scope,
            error_depth: self.debug.error_depth,
            focus: self.debug.focus,
            run_timeout: Duration::from_secs(self.checker.timeout_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_rounds: self.pipeline.max_rounds,
            error_policy: self.pipeline.error_policy,
            secondary: self.pipeline.secondary,
            save_final_codes: self.pipeline.save_final_codes,
            concurrency: self.pipeline.concurrency,
            save_root: self.storage.save_root.clone(),
            results_file: self.storage.results_file.clone(),
            debug: self.debug_settings(),
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model name; the provider is picked from its prefix.
    pub model: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Timeout per LLM call in milliseconds.
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Environment variable holding the API key, overriding the provider default.
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000, // 5 minutes
            temperature: None,
            api_key_env: None,
        }
    }
}

/// Debug loop budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Iteration budget per backend.
    pub max: u32,

    /// Debug iterations before a reboot.
    pub reboot: u32,

    /// Checker failures that reboot both testbench and checker.
    #[serde(rename = "py-rollback")]
    pub py_rollback: u32,

    #[serde(rename = "rollback-scope")]
    pub rollback_scope: RollbackScope,

    /// Traceback frames kept in checker diagnostics.
    #[serde(rename = "error-depth")]
    pub error_depth: usize,

    /// Repair only the non-scaffold part of checkers.
    pub focus: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            max: 5,
            reboot: 3,
            py_rollback: 2,
            rollback_scope: RollbackScope::PerEntry,
            error_depth: 1,
            focus: true,
        }
    }
}

/// Checker executables and timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Hard timeout per run in seconds.
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    pub iverilog: String,
    pub vvp: String,
    pub python: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            iverilog: "iverilog".to_string(),
            vvp: "vvp".to_string(),
            python: "python3".to_string(),
        }
    }
}

/// Batch pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tasks processed at once.
    pub concurrency: usize,

    /// Generate/validate rounds per task.
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,

    #[serde(rename = "error-policy")]
    pub error_policy: ErrorPolicy,

    /// Run the behavioral checker after the simulator passes.
    pub secondary: bool,

    /// Write final_TB.v / final_TB.py per task.
    #[serde(rename = "save-final-codes")]
    pub save_final_codes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_rounds: 1,
            error_policy: ErrorPolicy::Continue,
            secondary: true,
            save_final_codes: true,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the per-task output trees.
    #[serde(rename = "save-root")]
    pub save_root: PathBuf,

    /// Batch results file name, written under save-root.
    #[serde(rename = "results-file")]
    pub results_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("./runs"),
            results_file: "run_info.json".to_string(),
        }
    }
}
