//! CLI command definitions using clap.
//!
//! - run: generate and validate testbenches for dataset tasks
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tbloop - LLM-driven testbench generation with a debug/reboot validation loop
#[derive(Parser, Debug)]
#[command(name = "tbloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate and validate testbenches for tasks of a JSONL dataset
    Run {
        /// Dataset file, one task per line
        #[arg(short, long)]
        dataset: PathBuf,

        /// Only run these tasks (id or number); repeatable
        #[arg(short, long = "task")]
        tasks: Vec<String>,

        /// Tasks processed at once, overriding the config
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Skip the behavioral checker
        #[arg(long)]
        no_secondary: bool,

        /// Output root, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    Config,
}
