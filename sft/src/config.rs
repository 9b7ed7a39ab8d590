//! Behavior SFT configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use transformpipe::transforms::BEHAVIOR_ACTION_DIM;
use transformpipe::{
    AssetsBaseConfig, BuildError, DataConfig, DefaultModelTransforms, KeyRemapSpec, ModelConfig, PipelineBuilder,
    TransformStageConfig,
};

/// Project-local config file name
pub const LOCAL_CONFIG: &str = "behavior-sft.yml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Model parameters the pipeline depends on
    pub model: ModelConfig,

    /// Dataset and transform configuration
    pub data: DataSection,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Dataset repository id
    #[serde(rename = "repo-id")]
    pub repo_id: String,

    /// Asset directory name for norm stats (defaults to repo-id)
    #[serde(rename = "asset-id", skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    /// Root directory holding per-asset norm stats
    #[serde(rename = "assets-dir")]
    pub assets_dir: PathBuf,

    /// Derive prompts from the dataset's task field
    #[serde(rename = "prompt-from-task")]
    pub prompt_from_task: bool,

    /// Prompt injected when a record has none
    #[serde(rename = "default-prompt", skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,

    /// Width of dataset action vectors
    #[serde(rename = "dataset-action-dim")]
    pub dataset_action_dim: usize,

    /// Target key <- dataset key
    pub repack: KeyRemapSpec,

    /// Pipeline shape
    pub transforms: TransformStageConfig,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            repo_id: "behavior-1k/2025-challenge-demos".to_string(),
            asset_id: None,
            assets_dir: PathBuf::from("assets"),
            prompt_from_task: true,
            default_prompt: None,
            dataset_action_dim: BEHAVIOR_ACTION_DIM,
            repack: KeyRemapSpec::behavior(),
            transforms: TransformStageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        if self.model.action_dim == 0 {
            return Err(eyre::eyre!("model.action-dim must be positive"));
        }
        if self.data.dataset_action_dim == 0 {
            return Err(eyre::eyre!("data.dataset-action-dim must be positive"));
        }
        if self.data.repo_id.trim().is_empty() {
            return Err(eyre::eyre!("data.repo-id must be set"));
        }
        self.data
            .transforms
            .validate_dims(self.model.action_dim, self.data.dataset_action_dim)
            .context("Invalid data.transforms")?;
        Ok(())
    }

    /// Pipeline builder wired to this config's factories
    pub fn builder(&self) -> PipelineBuilder {
        let mut base = AssetsBaseConfig::new(&self.data.assets_dir, &self.data.repo_id);
        base.asset_id = self.data.asset_id.clone();
        base.prompt_from_task = self.data.prompt_from_task;

        PipelineBuilder::new(
            Arc::new(base),
            Arc::new(DefaultModelTransforms::new(self.data.default_prompt.clone())),
        )
        .with_repack(self.data.repack.clone())
        .with_dataset_action_dim(self.data.dataset_action_dim)
    }

    /// Build the finished data config
    pub fn data_config(&self) -> Result<DataConfig, BuildError> {
        self.builder().build(&self.data.transforms, &self.model)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("behavior-sft").join(LOCAL_CONFIG);
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => PathBuf::from(LOCAL_CONFIG),
        };
        let content = fs::read_to_string(path).ok()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
        value.get("log-level")?.as_str().map(str::to_string)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
