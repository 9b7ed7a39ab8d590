//! Injected collaborators: base data config and model transforms
//!
//! The builder never hard-wires either one. It calls a [`BaseConfigFactory`]
//! for the template [`DataConfig`] and a [`ModelTransformFactory`] for the
//! model stage, each exactly once per build.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::BuildError;
use crate::group::{Pipeline, TransformGroup};
use crate::model::ModelConfig;
use crate::norm::{NormStatsMap, load_norm_stats};
use crate::transforms::{AbsoluteActions, DeltaActions, InjectDefaultPrompt, RearrangeActions, TransformRef};

/// Finished data configuration handed to a runner
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Dataset repository id
    pub repo_id: Option<String>,

    /// Asset directory name holding normalization stats
    pub asset_id: Option<String>,

    pub norm_stats: Option<NormStatsMap>,

    /// Quantile normalization instead of z-score
    pub use_quantile_norm: bool,

    /// Derive the prompt from the dataset's task field
    pub prompt_from_task: bool,

    pub repack_transforms: TransformGroup,
    pub data_transforms: TransformGroup,
    pub model_transforms: TransformGroup,

    /// Fields treated as action sequences when loading chunks
    pub action_sequence_keys: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            repo_id: None,
            asset_id: None,
            norm_stats: None,
            use_quantile_norm: false,
            prompt_from_task: false,
            repack_transforms: TransformGroup::default(),
            data_transforms: TransformGroup::default(),
            model_transforms: TransformGroup::default(),
            action_sequence_keys: vec!["actions".to_string()],
        }
    }
}

impl DataConfig {
    /// Compose the repack, data and model groups into a pipeline
    pub fn pipeline(&self) -> Result<Pipeline, BuildError> {
        debug!(has_norm_stats = self.norm_stats.is_some(), "DataConfig::pipeline: called");
        Pipeline::new(
            self.repack_transforms.clone(),
            self.data_transforms.clone(),
            self.model_transforms.clone(),
            self.norm_stats.as_ref(),
            self.use_quantile_norm,
        )
        .map(|pipeline| pipeline.with_prompt_from_task(self.prompt_from_task))
    }
}

/// Supplies the template config the builder overrides
pub trait BaseConfigFactory: Send + Sync {
    fn create_base_config(&self, model: &ModelConfig) -> Result<DataConfig, BuildError>;
}

/// Base config backed by an assets directory
///
/// Normalization stats are read from `assets_dir/asset_id/norm_stats.json`
/// when the file exists.
#[derive(Debug, Clone)]
pub struct AssetsBaseConfig {
    pub assets_dir: PathBuf,
    pub repo_id: String,
    /// Defaults to `repo_id`
    pub asset_id: Option<String>,
    pub prompt_from_task: bool,
}

impl AssetsBaseConfig {
    pub fn new(assets_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            repo_id: repo_id.into(),
            asset_id: None,
            prompt_from_task: false,
        }
    }

    pub fn asset_id(&self) -> &str {
        self.asset_id.as_deref().unwrap_or(&self.repo_id)
    }
}

impl BaseConfigFactory for AssetsBaseConfig {
    fn create_base_config(&self, model: &ModelConfig) -> Result<DataConfig, BuildError> {
        debug!(repo_id = %self.repo_id, asset_id = %self.asset_id(), "AssetsBaseConfig::create_base_config: called");
        if self.repo_id.trim().is_empty() {
            return Err(BuildError::invalid("repo_id", "must not be empty"));
        }
        let asset_dir = self.assets_dir.join(self.asset_id());
        let norm_stats = load_norm_stats(&asset_dir)?;
        if norm_stats.is_none() {
            warn!(dir = %asset_dir.display(), "No norm stats found, records will not be normalized");
        }
        Ok(DataConfig {
            repo_id: Some(self.repo_id.clone()),
            asset_id: Some(self.asset_id().to_string()),
            norm_stats,
            use_quantile_norm: model.model_type.uses_quantile_norm(),
            prompt_from_task: self.prompt_from_task,
            ..Default::default()
        })
    }
}

/// Builds the model-specific transform group
///
/// Receives the optional action rearrangement and the expanded model-side
/// delta mask. Closures with the same signature implement it too.
pub trait ModelTransformFactory: Send + Sync {
    fn create(
        &self,
        rearrange_action_indices: Option<&[usize]>,
        model_delta_action_mask: Option<&[bool]>,
        model: &ModelConfig,
    ) -> Result<TransformGroup, BuildError>;
}

impl<F> ModelTransformFactory for F
where
    F: Fn(Option<&[usize]>, Option<&[bool]>, &ModelConfig) -> Result<TransformGroup, BuildError> + Send + Sync,
{
    fn create(
        &self,
        rearrange_action_indices: Option<&[usize]>,
        model_delta_action_mask: Option<&[bool]>,
        model: &ModelConfig,
    ) -> Result<TransformGroup, BuildError> {
        self(rearrange_action_indices, model_delta_action_mask, model)
    }
}

/// Default model stage: prompt injection, action rearrangement, model-side deltas
///
/// Tokenization and image resizing belong to the model itself.
#[derive(Debug, Clone, Default)]
pub struct DefaultModelTransforms {
    pub default_prompt: Option<String>,
}

impl DefaultModelTransforms {
    pub fn new(default_prompt: Option<String>) -> Self {
        Self { default_prompt }
    }
}

impl ModelTransformFactory for DefaultModelTransforms {
    fn create(
        &self,
        rearrange_action_indices: Option<&[usize]>,
        model_delta_action_mask: Option<&[bool]>,
        model: &ModelConfig,
    ) -> Result<TransformGroup, BuildError> {
        debug!(
            ?rearrange_action_indices,
            has_mask = model_delta_action_mask.is_some(),
            model_type = %model.model_type,
            "DefaultModelTransforms::create: called"
        );
        let mut group = TransformGroup::default();
        if let Some(prompt) = &self.default_prompt {
            group = group.push(vec![Arc::new(InjectDefaultPrompt::new(prompt.clone()))], vec![]);
        }
        if let Some(indices) = rearrange_action_indices {
            let rearrange = RearrangeActions::new(indices.to_vec())?;
            let inverse: TransformRef = Arc::new(rearrange.inverse());
            group = group.push(vec![Arc::new(rearrange)], vec![inverse]);
        }
        if let Some(mask) = model_delta_action_mask {
            group = group.push(
                vec![Arc::new(DeltaActions::new(mask.to_vec()))],
                vec![Arc::new(AbsoluteActions::new(mask.to_vec()))],
            );
        }
        Ok(group)
    }
}
