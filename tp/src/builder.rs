//! Transform pipeline builder
//!
//! Builds the Behavior data config in a fixed order:
//!
//! 1. repack: rename dataset fields to canonical names (inputs only)
//! 2. data: `BehaviorInputs` / `BehaviorOutputs`
//! 3. subsample: only when the stride is above 1
//! 4. delta: only when a delta mask is configured
//! 5. model: whatever the injected factory returns
//!
//! Conditional data stages are collected as [`Stage`]s and inactive ones are
//! filtered out before folding, so a skipped stage leaves no trace in the
//! transform lists.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransformStageConfig;
use crate::error::BuildError;
use crate::factory::{BaseConfigFactory, DataConfig, ModelTransformFactory};
use crate::group::TransformGroup;
use crate::model::ModelConfig;
use crate::transforms::{
    AbsoluteActions, BEHAVIOR_ACTION_DIM, BehaviorInputs, BehaviorOutputs, DeltaActions, KeyRemapSpec,
    RepackTransform, SubsampleActions, TransformRef,
};

/// One optional data stage
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: &'static str,
    pub active: bool,
    pub group: TransformGroup,
}

impl Stage {
    fn new(name: &'static str, active: bool, inputs: Vec<TransformRef>, outputs: Vec<TransformRef>) -> Self {
        Self {
            name,
            active,
            group: TransformGroup::new(inputs, outputs),
        }
    }
}

/// Builds a [`DataConfig`] from a [`TransformStageConfig`]
pub struct PipelineBuilder {
    base: Arc<dyn BaseConfigFactory>,
    model_factory: Arc<dyn ModelTransformFactory>,
    repack: KeyRemapSpec,
    dataset_action_dim: usize,
}

impl PipelineBuilder {
    /// Builder for the Behavior dataset layout
    pub fn new(base: Arc<dyn BaseConfigFactory>, model_factory: Arc<dyn ModelTransformFactory>) -> Self {
        Self {
            base,
            model_factory,
            repack: KeyRemapSpec::behavior(),
            dataset_action_dim: BEHAVIOR_ACTION_DIM,
        }
    }

    /// Replace the dataset key mapping
    pub fn with_repack(mut self, repack: KeyRemapSpec) -> Self {
        self.repack = repack;
        self
    }

    /// Replace the dataset action width used by the output transform
    pub fn with_dataset_action_dim(mut self, dim: usize) -> Self {
        self.dataset_action_dim = dim;
        self
    }

    pub fn dataset_action_dim(&self) -> usize {
        self.dataset_action_dim
    }

    /// Stage 1: rename dataset fields; no output transform
    pub fn repack_group(&self) -> TransformGroup {
        TransformGroup::inputs_only(vec![Arc::new(RepackTransform::new(self.repack.clone()))])
    }

    /// Stage 2: unconditional data transforms
    ///
    /// The input side pads to the model's action width and the output side
    /// truncates to the dataset's.
    pub fn base_data_group(&self, model: &ModelConfig) -> TransformGroup {
        TransformGroup::new(
            vec![Arc::new(BehaviorInputs::new(model.action_dim, model.model_type))],
            vec![Arc::new(BehaviorOutputs::new(self.dataset_action_dim))],
        )
    }

    /// Stages 3 and 4, in order, including inactive ones
    pub fn optional_stages(&self, config: &TransformStageConfig) -> Vec<Stage> {
        let stride = config.subsample_action_stride();
        let subsample = SubsampleActions::new(stride);

        let (delta_in, delta_out): (Vec<TransformRef>, Vec<TransformRef>) = match config.delta_flags() {
            Some(mask) => (
                vec![Arc::new(DeltaActions::new(mask.to_vec()))],
                vec![Arc::new(AbsoluteActions::new(mask.to_vec()))],
            ),
            None => (vec![], vec![]),
        };

        vec![
            Stage::new(
                "subsample",
                stride.get() > 1,
                vec![Arc::new(subsample)],
                vec![Arc::new(subsample)],
            ),
            Stage::new("delta", config.delta_flags().is_some(), delta_in, delta_out),
        ]
    }

    /// Stages 2 to 4 merged
    pub fn data_group(&self, config: &TransformStageConfig, model: &ModelConfig) -> TransformGroup {
        self.optional_stages(config)
            .into_iter()
            .filter(|stage| {
                debug!(stage = stage.name, active = stage.active, "PipelineBuilder::data_group: stage");
                stage.active
            })
            .fold(self.base_data_group(model), |group, stage| {
                group.push(stage.group.inputs, stage.group.outputs)
            })
    }

    /// Validate everything, then assemble the data config
    pub fn build(&self, config: &TransformStageConfig, model: &ModelConfig) -> Result<DataConfig, BuildError> {
        debug!(?config, ?model, "PipelineBuilder::build: called");
        if model.action_dim == 0 {
            return Err(BuildError::invalid("action_dim", "model action_dim must be positive"));
        }
        config.validate_dims(model.action_dim, self.dataset_action_dim)?;

        let repack_transforms = self.repack_group();
        let data_transforms = self.data_group(config, model);
        let model_transforms =
            self.model_factory
                .create(config.rearrange_action_indices(), config.model_delta_flags(), model)?;

        let data_config = DataConfig {
            repack_transforms,
            data_transforms,
            model_transforms,
            action_sequence_keys: config.action_sequence_keys().to_vec(),
            ..self.base.create_base_config(model)?
        };

        // Norm stats must suit the normalization mode
        data_config.pipeline()?;

        info!(
            data_inputs = ?data_config.data_transforms.input_names(),
            data_outputs = ?data_config.data_transforms.output_names(),
            model_inputs = ?data_config.model_transforms.input_names(),
            "Built transform pipeline"
        );
        Ok(data_config)
    }
}
