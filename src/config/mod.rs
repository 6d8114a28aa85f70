//! Configuration system for tbloop.
//!
//! One YAML file, every section optional:
//! `llm`, `debug`, `checker`, `pipeline`, `storage`.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::GlobalConfig;

mod global;

pub type Config = GlobalConfig;

/// Default LLM model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Load configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .tbloop.yml in current directory (project config)
/// 3. ~/.config/tbloop/tbloop.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    let config = GlobalConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
