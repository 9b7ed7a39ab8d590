//! CLI argument parsing for the Behavior SFT tool

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Behavior SFT - data pipeline for supervised fine-tuning
#[derive(Parser, Debug)]
#[command(name = "sft")]
#[command(author, version, about = "Behavior dataset SFT data pipeline", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration as JSON
    Config,

    /// Build the pipeline and list its input and output chains
    Pipeline,

    /// Apply the input chain to dataset records (JSONL)
    Transform {
        /// JSONL file of dataset records
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first record that fails
        #[arg(long)]
        fail_fast: bool,
    },

    /// Apply the output chain to model predictions (JSONL)
    Postprocess {
        /// JSONL file of predictions
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first record that fails
        #[arg(long)]
        fail_fast: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transform() {
        let cli = Cli::parse_from(["sft", "-l", "debug", "transform", "in.jsonl", "-o", "out.jsonl", "--fail-fast"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Transform {
                input,
                output,
                fail_fast,
            } => {
                assert_eq!(input, PathBuf::from("in.jsonl"));
                assert_eq!(output, Some(PathBuf::from("out.jsonl")));
                assert!(fail_fast);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
