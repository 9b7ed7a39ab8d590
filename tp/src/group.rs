//! Transform groups and the assembled pipeline

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::BuildError;
use crate::norm::NormStatsMap;
use crate::record::Record;
use crate::transforms::{DataTransform, Normalize, PromptFromTask, TransformError, TransformRef, Unnormalize, apply_chain};

/// Paired input and output transform lists
///
/// Groups compose by [`push`](Self::push): new inputs run after the existing
/// inputs and new outputs run before the existing outputs, so the output
/// list always mirrors the input list in reverse.
#[derive(Clone, Default)]
pub struct TransformGroup {
    pub inputs: Vec<TransformRef>,
    pub outputs: Vec<TransformRef>,
}

impl TransformGroup {
    pub fn new(inputs: Vec<TransformRef>, outputs: Vec<TransformRef>) -> Self {
        Self { inputs, outputs }
    }

    /// Group with input transforms only
    pub fn inputs_only(inputs: Vec<TransformRef>) -> Self {
        Self {
            inputs,
            outputs: Vec::new(),
        }
    }

    /// Append `inputs` after ours and prepend `outputs` before ours
    pub fn push(self, inputs: Vec<TransformRef>, outputs: Vec<TransformRef>) -> Self {
        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "TransformGroup::push: called"
        );
        let mut merged_inputs = self.inputs;
        merged_inputs.extend(inputs);
        let mut merged_outputs = outputs;
        merged_outputs.extend(self.outputs);
        Self {
            inputs: merged_inputs,
            outputs: merged_outputs,
        }
    }

    pub fn input_names(&self) -> Vec<&'static str> {
        self.inputs.iter().map(|t| t.name()).collect()
    }

    pub fn output_names(&self) -> Vec<&'static str> {
        self.outputs.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

impl fmt::Debug for TransformGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformGroup")
            .field("inputs", &self.input_names())
            .field("outputs", &self.output_names())
            .finish()
    }
}

/// Final composition of the repack, data and model groups
///
/// Normalization sits between the data and model groups when stats are
/// available. Task-derived prompts are set before repacking.
#[derive(Debug, Clone)]
pub struct Pipeline {
    prompt_from_task: Option<TransformRef>,
    repack: TransformGroup,
    data: TransformGroup,
    model: TransformGroup,
    normalize: Option<(TransformRef, TransformRef)>,
}

impl Pipeline {
    pub fn new(
        repack: TransformGroup,
        data: TransformGroup,
        model: TransformGroup,
        norm_stats: Option<&NormStatsMap>,
        use_quantile_norm: bool,
    ) -> Result<Self, BuildError> {
        let normalize = match norm_stats {
            Some(stats) => {
                let fwd: TransformRef = Arc::new(Normalize::new(stats.clone(), use_quantile_norm)?);
                let inv: TransformRef = Arc::new(Unnormalize::new(stats.clone(), use_quantile_norm)?);
                Some((fwd, inv))
            }
            None => None,
        };
        Ok(Self {
            prompt_from_task: None,
            repack,
            data,
            model,
            normalize,
        })
    }

    /// Derive `prompt` from the dataset's `task` field ahead of repacking
    pub fn with_prompt_from_task(mut self, enabled: bool) -> Self {
        self.prompt_from_task = enabled.then(|| Arc::new(PromptFromTask) as TransformRef);
        self
    }

    pub fn repack(&self) -> &TransformGroup {
        &self.repack
    }

    pub fn data(&self) -> &TransformGroup {
        &self.data
    }

    pub fn model(&self) -> &TransformGroup {
        &self.model
    }

    /// Transforms applied when loading a dataset record
    pub fn input_chain(&self) -> Vec<TransformRef> {
        let mut chain: Vec<TransformRef> = self.prompt_from_task.iter().cloned().collect();
        chain.extend(self.repack.inputs.iter().cloned());
        chain.extend(self.data.inputs.iter().cloned());
        if let Some((fwd, _)) = &self.normalize {
            chain.push(fwd.clone());
        }
        chain.extend(self.model.inputs.iter().cloned());
        chain
    }

    /// Transforms applied to model predictions, in reverse stage order
    pub fn output_chain(&self) -> Vec<TransformRef> {
        let mut chain = Vec::new();
        chain.extend(self.model.outputs.iter().cloned());
        if let Some((_, inv)) = &self.normalize {
            chain.push(inv.clone());
        }
        chain.extend(self.data.outputs.iter().cloned());
        chain.extend(self.repack.outputs.iter().cloned());
        chain
    }

    pub fn apply_inputs(&self, record: Record) -> Result<Record, TransformError> {
        apply_chain(&self.input_chain(), record)
    }

    pub fn apply_outputs(&self, record: Record) -> Result<Record, TransformError> {
        apply_chain(&self.output_chain(), record)
    }
}

/// Names of a chain, for listings and tests
pub fn chain_names(chain: &[TransformRef]) -> Vec<&'static str> {
    chain.iter().map(|t| t.name()).collect()
}
