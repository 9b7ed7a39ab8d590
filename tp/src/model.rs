//! Model configuration consumed by the pipeline builder

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Default model action dimensionality
pub const DEFAULT_ACTION_DIM: usize = 32;

/// Policy architecture family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Pi0,
    #[default]
    Pi05,
    Pi0Fast,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pi0 => write!(f, "pi0"),
            Self::Pi05 => write!(f, "pi05"),
            Self::Pi0Fast => write!(f, "pi0_fast"),
        }
    }
}

impl ModelType {
    /// Whether normalization should use quantiles instead of mean/std
    pub fn uses_quantile_norm(&self) -> bool {
        debug!(?self, "ModelType::uses_quantile_norm: called");
        !matches!(self, Self::Pi0)
    }
}

/// Read-only model parameters the pipeline depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Architecture family
    #[serde(rename = "model-type")]
    pub model_type: ModelType,

    /// Width of the model's action vectors
    #[serde(rename = "action-dim")]
    pub action_dim: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::default(),
            action_dim: DEFAULT_ACTION_DIM,
        }
    }
}

impl ModelConfig {
    pub fn new(model_type: ModelType, action_dim: usize) -> Self {
        Self { model_type, action_dim }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_norm_by_model_type() {
        assert!(!ModelType::Pi0.uses_quantile_norm());
        assert!(ModelType::Pi05.uses_quantile_norm());
        assert!(ModelType::Pi0Fast.uses_quantile_norm());
    }

    #[test]
    fn test_model_type_serde_names() {
        let t: ModelType = serde_json::from_str(r#""pi0_fast""#).unwrap();
        assert_eq!(t, ModelType::Pi0Fast);
        assert_eq!(t.to_string(), "pi0_fast");
    }

    #[test]
    fn test_model_config_defaults() {
        let cfg: ModelConfig = serde_json::from_str(r#"{"model-type": "pi0"}"#).unwrap();
        assert_eq!(cfg.model_type, ModelType::Pi0);
        assert_eq!(cfg.action_dim, DEFAULT_ACTION_DIM);
    }
}
