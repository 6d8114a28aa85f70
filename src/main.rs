use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

use tbloop::llm;
use tbloop::pipeline::{BatchRunner, LiveEnvironment};
use tbloop::progress::LogProgress;
use tbloop::storage::{load_dataset, select_tasks};
use tbloop::usage::UsageLedger;

fn setup_logging(verbose: bool) -> Result<()> {
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        return Ok(());
    }

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tbloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tbloop.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: Config) -> Result<()> {
    match &cli.command {
        Commands::Run {
            dataset,
            tasks,
            concurrency,
            no_secondary,
            output,
        } => {
            let mut config = config;
            if let Some(concurrency) = concurrency {
                config.pipeline.concurrency = (*concurrency).max(1);
            }
            if *no_secondary {
                config.pipeline.secondary = false;
            }
            if let Some(output) = output {
                config.storage.save_root = output.clone();
            }

            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(handle_run_command(dataset, tasks, &config))
        }
        Commands::Config => handle_config_command(&config),
    }
}

async fn handle_run_command(dataset: &Path, keys: &[String], config: &Config) -> Result<()> {
    let tasks = load_dataset(dataset).context(format!("Failed to load dataset {}", dataset.display()))?;
    let tasks = select_tasks(tasks, keys)?;
    if tasks.is_empty() {
        println!("{}", "No tasks selected".yellow());
        return Ok(());
    }
    println!("{} {} tasks from {}", "Running:".green(), tasks.len(), dataset.display());

    let client = llm::connect(config.client_config()).context("Failed to create LLM client")?;
    let ledger = UsageLedger::new();
    let environment = LiveEnvironment::new(client, ledger.clone(), Arc::new(LogProgress))
        .with_executables(&config.checker.iverilog, &config.checker.vvp, &config.checker.python)
        .with_sampling(config.llm.max_tokens, config.llm.temperature)
        .with_checker(config.pipeline.secondary);

    let runner = BatchRunner::new(config.pipeline_settings(), Arc::new(environment))?;
    let summary = runner.run(tasks).await?;

    let usage = ledger.totals();
    println!(
        "{} {}/{} passed{}",
        "Done:".green(),
        summary.passed,
        summary.total,
        if summary.incomplete > 0 {
            format!(", {} incomplete", summary.incomplete).red().to_string()
        } else {
            String::new()
        }
    );
    println!(
        "  tokens: {} prompt / {} completion, cost ${:.4}",
        usage.prompt_tokens, usage.completion_tokens, usage.cost_usd
    );
    for (model, totals) in ledger.per_model() {
        println!("    {}: {} tokens, ${:.4}", model.cyan(), totals.total_tokens(), totals.cost_usd);
    }
    println!("  results: {}", summary.results_path.display());
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    let config = config::load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).context("Application failed")?;

    Ok(())
}
