//! Behavior SFT - CLI entry point

use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use behaviorsft::cli::{Cli, Command};
use behaviorsft::config::Config;
use behaviorsft::runner::{Direction, JsonlRunner, Runner};
use transformpipe::chain_names;

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        model_type = %config.model.model_type,
        action_dim = config.model.action_dim,
        repo_id = %config.data.repo_id,
        "sft starting"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Config => cmd_config(&config),
        Command::Pipeline => cmd_pipeline(&config),
        Command::Transform {
            input,
            output,
            fail_fast,
        } => cmd_run(&config, input, output, fail_fast, Direction::Inputs),
        Command::Postprocess {
            input,
            output,
            fail_fast,
        } => cmd_run(&config, input, output, fail_fast, Direction::Outputs),
    }
}

/// Print the resolved configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Build the pipeline and list both chains
fn cmd_pipeline(config: &Config) -> Result<()> {
    debug!("cmd_pipeline: called");
    let data_config = config.data_config().context("Failed to build pipeline")?;
    let pipeline = data_config.pipeline()?;

    println!("{}", "Input chain:".bold());
    for (i, name) in chain_names(&pipeline.input_chain()).iter().enumerate() {
        println!("  {}. {}", i + 1, name.cyan());
    }
    println!("{}", "Output chain:".bold());
    for (i, name) in chain_names(&pipeline.output_chain()).iter().enumerate() {
        println!("  {}. {}", i + 1, name.cyan());
    }
    println!(
        "{} action-sequence-keys: {}",
        "✓".green(),
        data_config.action_sequence_keys.join(", ")
    );
    Ok(())
}

/// Run one chain over a JSONL file
fn cmd_run(
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    fail_fast: bool,
    direction: Direction,
) -> Result<()> {
    debug!(?input, ?output, fail_fast, ?direction, "cmd_run: called");
    let pipeline = config
        .data_config()
        .context("Failed to build pipeline")?
        .pipeline()?;

    let mut runner = JsonlRunner::new(input, direction).fail_fast(fail_fast);
    if let Some(path) = &output {
        runner = runner.output(path);
    }
    let summary = runner.run(&pipeline)?;

    // Keep stdout clean for piped records
    eprintln!(
        "{} {} records processed, {} failed",
        "✓".green(),
        summary.processed,
        summary.failed.to_string().yellow()
    );
    Ok(())
}
