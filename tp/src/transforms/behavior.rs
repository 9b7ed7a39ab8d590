//! Behavior (B1K) dataset data transforms
//!
//! `BehaviorInputs` turns repacked dataset fields into the structure the
//! policy consumes; `BehaviorOutputs` maps policy actions back to the
//! dataset's action space.

use tracing::debug;

use super::error::TransformError;
use super::traits::{DataTransform, array_field};
use crate::model::ModelType;
use crate::record::{Record, Value};

/// Width of an action vector in the Behavior dataset
pub const BEHAVIOR_ACTION_DIM: usize = 23;

/// Camera fields in the repacked record, paired with the model's image names
const CAMERAS: [(&str, &str); 3] = [
    ("observation/egocentric_camera", "base_0_rgb"),
    ("observation/wrist_image_left", "left_wrist_0_rgb"),
    ("observation/wrist_image_right", "right_wrist_0_rgb"),
];

/// Converts canonical fields into model inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorInputs {
    /// Model action width; state and actions are zero-padded to it
    pub action_dim: usize,
    pub model_type: ModelType,
}

impl BehaviorInputs {
    pub fn new(action_dim: usize, model_type: ModelType) -> Self {
        debug!(action_dim, %model_type, "BehaviorInputs::new: called");
        Self { action_dim, model_type }
    }

    /// Mask flag for a camera; FAST models attend to padded images too
    fn image_mask(&self, present: bool) -> bool {
        present || self.model_type == ModelType::Pi0Fast
    }
}

impl DataTransform for BehaviorInputs {
    fn name(&self) -> &'static str {
        "behavior_inputs"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        let state = array_field(&record, "observation/state", self.name())?.pad_to_dim(self.action_dim);

        // The egocentric camera is required; wrist cameras fall back to a blank frame
        let base = array_field(&record, CAMERAS[0].0, self.name())?.to_image_hwc();
        let mut images = Record::new();
        let mut masks = Record::new();
        for (field, name) in CAMERAS {
            let (image, present) = match record.get(field) {
                Some(_) => (array_field(&record, field, self.name())?.to_image_hwc(), true),
                None => {
                    debug!(%field, "BehaviorInputs::apply: camera missing, using blank frame");
                    let mut blank = base.clone();
                    blank.data_mut().fill(0.0);
                    (blank, false)
                }
            };
            images.insert(name.to_string(), image.into());
            masks.insert(name.to_string(), Value::Bool(self.image_mask(present)));
        }

        let mut out = Record::new();
        out.insert("state".to_string(), state.into());
        out.insert("image".to_string(), Value::Map(images));
        out.insert("image_mask".to_string(), Value::Map(masks));

        if record.contains_key("actions") {
            let actions = array_field(&record, "actions", self.name())?.pad_to_dim(self.action_dim);
            out.insert("actions".to_string(), actions.into());
        }
        if let Some(prompt) = record.get("prompt") {
            out.insert("prompt".to_string(), prompt.clone());
        }
        Ok(out)
    }
}

/// Truncates model actions to the dataset's action width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorOutputs {
    pub action_dim: usize,
}

impl BehaviorOutputs {
    pub fn new(action_dim: usize) -> Self {
        Self { action_dim }
    }
}

impl Default for BehaviorOutputs {
    fn default() -> Self {
        Self::new(BEHAVIOR_ACTION_DIM)
    }
}

impl DataTransform for BehaviorOutputs {
    fn name(&self) -> &'static str {
        "behavior_outputs"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        let actions = array_field(&record, "actions", self.name())?.truncate_last(self.action_dim);
        let mut out = Record::new();
        out.insert("actions".to_string(), actions.into());
        Ok(out)
    }
}
