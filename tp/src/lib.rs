//! TransformPipe - declarative record transform pipelines
//!
//! Builds the ordered input and output transform chains used to fine-tune a
//! robot-control policy on the Behavior dataset. Dataset records are renamed
//! into canonical fields, shaped for the model, optionally subsampled and
//! delta-encoded, then handed to model-specific transforms. The output chain
//! runs the inverse steps in reverse order.
//!
//! # Modules
//!
//! - [`record`] - records, values and dense arrays
//! - [`transforms`] - the individual transforms
//! - [`group`] - transform groups and the assembled pipeline
//! - [`config`] - validated stage configuration
//! - [`builder`] - the pipeline builder
//! - [`factory`] - injected base-config and model-transform factories
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transformpipe::{AssetsBaseConfig, DefaultModelTransforms, ModelConfig, PipelineBuilder, TransformStageConfig};
//!
//! let builder = PipelineBuilder::new(
//!     Arc::new(AssetsBaseConfig::new("assets", "behavior-1k/demos")),
//!     Arc::new(DefaultModelTransforms::default()),
//! );
//! let data_config = builder.build(&TransformStageConfig::default(), &ModelConfig::default())?;
//! let pipeline = data_config.pipeline()?;
//! let model_input = pipeline.apply_inputs(record)?;
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod factory;
pub mod group;
pub mod model;
pub mod norm;
pub mod record;
pub mod transforms;

pub use builder::{PipelineBuilder, Stage};
pub use config::TransformStageConfig;
pub use error::BuildError;
pub use factory::{AssetsBaseConfig, BaseConfigFactory, DataConfig, DefaultModelTransforms, ModelTransformFactory};
pub use group::{Pipeline, TransformGroup, chain_names};
pub use model::{ModelConfig, ModelType};
pub use norm::{NormStats, NormStatsMap, load_norm_stats, save_norm_stats};
pub use record::{Array, ArrayError, DType, Record, Value};
pub use transforms::{DataTransform, KeyRemapSpec, TransformError, TransformRef};
