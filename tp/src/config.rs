//! Declarative transform-stage configuration
//!
//! [`TransformStageConfig`] is an immutable value validated on construction.
//! Rules that depend on model dimensions are checked by
//! [`TransformStageConfig::validate_dims`], which the builder runs before it
//! constructs anything.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::debug;

use crate::error::BuildError;
use crate::transforms::{RearrangeActions, make_bool_mask};

fn default_action_sequence_keys() -> Vec<String> {
    vec!["action".to_string()]
}

fn default_stride() -> i64 {
    1
}

/// Serialized form; kebab-case keys as used in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageConfigRepr {
    #[serde(rename = "action-sequence-keys", default = "default_action_sequence_keys")]
    action_sequence_keys: Vec<String>,

    #[serde(rename = "delta-action-mask", default)]
    delta_action_mask: Option<Vec<i32>>,

    #[serde(rename = "subsample-action-stride", default = "default_stride")]
    subsample_action_stride: i64,

    #[serde(rename = "rearrange-action-indices", default)]
    rearrange_action_indices: Option<Vec<usize>>,

    #[serde(rename = "model-delta-action-mask", default)]
    model_delta_action_mask: Option<Vec<i32>>,
}

/// Parameters controlling the shape of the transform pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StageConfigRepr", into = "StageConfigRepr")]
pub struct TransformStageConfig {
    action_sequence_keys: Vec<String>,
    delta_action_mask: Option<Vec<i32>>,
    subsample_action_stride: NonZeroUsize,
    rearrange_action_indices: Option<Vec<usize>>,
    model_delta_action_mask: Option<Vec<i32>>,

    /// Expanded forms of the two masks
    delta_flags: Option<Vec<bool>>,
    model_delta_flags: Option<Vec<bool>>,
}

impl TransformStageConfig {
    /// Validate and build a stage config
    pub fn new(
        action_sequence_keys: Vec<String>,
        delta_action_mask: Option<Vec<i32>>,
        subsample_action_stride: i64,
        rearrange_action_indices: Option<Vec<usize>>,
        model_delta_action_mask: Option<Vec<i32>>,
    ) -> Result<Self, BuildError> {
        debug!(
            ?action_sequence_keys,
            ?delta_action_mask,
            subsample_action_stride,
            ?rearrange_action_indices,
            ?model_delta_action_mask,
            "TransformStageConfig::new: called"
        );
        if action_sequence_keys.is_empty() {
            return Err(BuildError::invalid("action_sequence_keys", "must name at least one field"));
        }
        if action_sequence_keys.iter().any(String::is_empty) {
            return Err(BuildError::invalid(
                "action_sequence_keys",
                format!("empty field name in {:?}", action_sequence_keys),
            ));
        }

        let stride = usize::try_from(subsample_action_stride)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                BuildError::invalid(
                    "subsample_action_stride",
                    format!("must be a positive integer, got {}", subsample_action_stride),
                )
            })?;

        let delta_flags = delta_action_mask
            .as_deref()
            .map(|runs| make_bool_mask(runs).map_err(|_| zero_run("delta_action_mask", runs)))
            .transpose()?;
        let model_delta_flags = model_delta_action_mask
            .as_deref()
            .map(|runs| make_bool_mask(runs).map_err(|_| zero_run("model_delta_action_mask", runs)))
            .transpose()?;

        if let Some(indices) = &rearrange_action_indices {
            RearrangeActions::new(indices.clone())?;
        }

        // Both masks flagging one dim would delta-encode it twice. The model
        // mask applies after rearrangement, so position i holds dataset dim
        // indices[i].
        if let (Some(data), Some(model)) = (&delta_flags, &model_delta_flags) {
            let indices = rearrange_action_indices.as_deref().unwrap_or(&[]);
            let overlap = model
                .iter()
                .enumerate()
                .filter(|&(_, flagged)| *flagged)
                .map(|(pos, _)| indices.get(pos).copied().unwrap_or(pos))
                .find(|&dim| data.get(dim).copied().unwrap_or(false));
            if let Some(dim) = overlap {
                return Err(BuildError::invalid(
                    "model_delta_action_mask",
                    format!("dimension {} is already delta-encoded by delta_action_mask", dim),
                ));
            }
        }

        Ok(Self {
            action_sequence_keys,
            delta_action_mask,
            subsample_action_stride: stride,
            rearrange_action_indices,
            model_delta_action_mask,
            delta_flags,
            model_delta_flags,
        })
    }

    /// Check mask and index widths against the model and dataset action dims
    pub fn validate_dims(&self, model_action_dim: usize, dataset_action_dim: usize) -> Result<(), BuildError> {
        debug!(model_action_dim, dataset_action_dim, "TransformStageConfig::validate_dims: called");
        if let Some(flags) = &self.delta_flags {
            if flags.len() != dataset_action_dim {
                return Err(BuildError::invalid(
                    "delta_action_mask",
                    format!(
                        "covers {} dims but dataset actions have {}",
                        flags.len(),
                        dataset_action_dim
                    ),
                ));
            }
            if flags.len() > model_action_dim {
                return Err(BuildError::invalid(
                    "delta_action_mask",
                    format!("covers {} dims but model action_dim is {}", flags.len(), model_action_dim),
                ));
            }
        }
        if let Some(flags) = &self.model_delta_flags {
            if flags.len() > model_action_dim {
                return Err(BuildError::invalid(
                    "model_delta_action_mask",
                    format!("covers {} dims but model action_dim is {}", flags.len(), model_action_dim),
                ));
            }
        }
        if let Some(indices) = &self.rearrange_action_indices {
            if indices.len() > model_action_dim {
                return Err(BuildError::invalid(
                    "rearrange_action_indices",
                    format!("reorders {} dims but model action_dim is {}", indices.len(), model_action_dim),
                ));
            }
        }
        Ok(())
    }

    pub fn action_sequence_keys(&self) -> &[String] {
        &self.action_sequence_keys
    }

    pub fn delta_action_mask(&self) -> Option<&[i32]> {
        self.delta_action_mask.as_deref()
    }

    pub fn subsample_action_stride(&self) -> NonZeroUsize {
        self.subsample_action_stride
    }

    pub fn rearrange_action_indices(&self) -> Option<&[usize]> {
        self.rearrange_action_indices.as_deref()
    }

    pub fn model_delta_action_mask(&self) -> Option<&[i32]> {
        self.model_delta_action_mask.as_deref()
    }

    /// `delta_action_mask` expanded to one flag per action dim
    pub fn delta_flags(&self) -> Option<&[bool]> {
        self.delta_flags.as_deref()
    }

    /// `model_delta_action_mask` expanded to one flag per action dim
    pub fn model_delta_flags(&self) -> Option<&[bool]> {
        self.model_delta_flags.as_deref()
    }
}

fn zero_run(field: &'static str, runs: &[i32]) -> BuildError {
    BuildError::invalid(field, format!("mask runs must be non-zero, got {:?}", runs))
}

impl Default for TransformStageConfig {
    fn default() -> Self {
        Self {
            action_sequence_keys: default_action_sequence_keys(),
            delta_action_mask: None,
            subsample_action_stride: NonZeroUsize::MIN,
            rearrange_action_indices: None,
            model_delta_action_mask: None,
            delta_flags: None,
            model_delta_flags: None,
        }
    }
}

impl TryFrom<StageConfigRepr> for TransformStageConfig {
    type Error = BuildError;

    fn try_from(repr: StageConfigRepr) -> Result<Self, Self::Error> {
        Self::new(
            repr.action_sequence_keys,
            repr.delta_action_mask,
            repr.subsample_action_stride,
            repr.rearrange_action_indices,
            repr.model_delta_action_mask,
        )
    }
}

impl From<TransformStageConfig> for StageConfigRepr {
    fn from(cfg: TransformStageConfig) -> Self {
        Self {
            action_sequence_keys: cfg.action_sequence_keys,
            delta_action_mask: cfg.delta_action_mask,
            subsample_action_stride: cfg.subsample_action_stride.get() as i64,
            rearrange_action_indices: cfg.rearrange_action_indices,
            model_delta_action_mask: cfg.model_delta_action_mask,
        }
    }
}
