//! Behavior SFT - data configuration for supervised fine-tuning
//!
//! Wires a YAML configuration into the `transformpipe` builder to produce
//! the data config a training runner consumes, and offers a JSONL runner to
//! exercise the resulting pipeline without launching any workers.
//!
//! # Example
//!
//! ```ignore
//! use behaviorsft::config::Config;
//!
//! let config = Config::load(None)?;
//! config.validate()?;
//! let pipeline = config.data_config()?.pipeline()?;
//! ```

pub mod cli;
pub mod config;
pub mod runner;

pub use config::{Config, DataSection};
pub use runner::{Direction, JsonlRunner, RunSummary, Runner};
