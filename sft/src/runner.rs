//! Runners consume a built pipeline
//!
//! Training itself happens elsewhere; the runner seam lets the CLI drive a
//! pipeline over JSONL records so a data config can be checked end to end
//! before any worker is launched.

use eyre::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use transformpipe::transforms::apply_chain;
use transformpipe::{Pipeline, Record, TransformRef, chain_names};

/// Which chain of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dataset record -> model input
    Inputs,
    /// Model prediction -> dataset actions
    Outputs,
}

impl Direction {
    fn chain(&self, pipeline: &Pipeline) -> Vec<TransformRef> {
        match self {
            Self::Inputs => pipeline.input_chain(),
            Self::Outputs => pipeline.output_chain(),
        }
    }
}

/// Counts from a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Consumes a pipeline
pub trait Runner {
    fn run(&mut self, pipeline: &Pipeline) -> Result<RunSummary>;
}

/// Applies one chain to every record of a JSONL file
pub struct JsonlRunner {
    input: PathBuf,
    output: Option<PathBuf>,
    direction: Direction,
    fail_fast: bool,
}

impl JsonlRunner {
    pub fn new(input: impl Into<PathBuf>, direction: Direction) -> Self {
        Self {
            input: input.into(),
            output: None,
            direction,
            fail_fast: false,
        }
    }

    /// Write results to a file instead of stdout
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Abort on the first record that fails to transform
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    fn writer(&self) -> Result<Box<dyn Write>> {
        Ok(match &self.output {
            Some(path) => Box::new(BufWriter::new(
                fs::File::create(path).context(format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(std::io::stdout().lock())),
        })
    }
}

impl Runner for JsonlRunner {
    fn run(&mut self, pipeline: &Pipeline) -> Result<RunSummary> {
        debug!(input = ?self.input, direction = ?self.direction, "JsonlRunner::run: called");
        let chain = self.direction.chain(pipeline);
        info!(transforms = ?chain_names(&chain), "Running chain");

        let file = fs::File::open(&self.input).context(format!("Failed to open {}", self.input.display()))?;
        let reader = BufReader::new(file);
        let mut writer = self.writer()?;
        let mut summary = RunSummary::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read input")?;
            if line.trim().is_empty() {
                continue;
            }
            let lineno = idx + 1;
            let result = serde_json::from_str::<Record>(&line)
                .map_err(eyre::Report::from)
                .and_then(|record| apply_chain(&chain, record).map_err(eyre::Report::from));
            match result {
                Ok(record) => {
                    serde_json::to_writer(&mut writer, &record)?;
                    writeln!(writer)?;
                    summary.processed += 1;
                }
                Err(e) if self.fail_fast => {
                    return Err(e.wrap_err(format!("Record on line {} failed", lineno)));
                }
                Err(e) => {
                    warn!(line = lineno, error = %e, "Skipping record");
                    summary.failed += 1;
                }
            }
        }
        writer.flush()?;

        info!(processed = summary.processed, failed = summary.failed, "Run complete");
        Ok(summary)
    }
}
