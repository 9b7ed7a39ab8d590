//! Record transforms
//!
//! Every transform is a stateless [`DataTransform`] whose parameters are
//! fixed at construction. Input-direction transforms turn dataset records
//! into model inputs; output-direction transforms turn model predictions
//! back into dataset action space.

mod actions;
mod behavior;
mod error;
mod normalize;
mod prompt;
mod repack;
mod traits;

pub use actions::{AbsoluteActions, DeltaActions, RearrangeActions, SubsampleActions, make_bool_mask};
pub use behavior::{BEHAVIOR_ACTION_DIM, BehaviorInputs, BehaviorOutputs};
pub use error::TransformError;
pub use normalize::{Normalize, Unnormalize};
pub use prompt::{InjectDefaultPrompt, PromptFromTask};
pub use repack::{KeyRemapSpec, RepackTransform};
pub use traits::{DataTransform, TransformRef, apply_chain};
