//! Pipeline build errors

use thiserror::Error;

/// Errors raised while building a pipeline
///
/// Every configuration problem surfaces as `InvalidConfiguration` at build
/// time. Failures inside an injected factory propagate as `Factory`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("{factory} failed")]
    Factory {
        factory: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BuildError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    pub fn factory(factory: &'static str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Factory {
            factory,
            source: source.into(),
        }
    }

    /// Whether this is a configuration error (as opposed to a factory failure)
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}
