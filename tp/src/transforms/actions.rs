//! Action-sequence transforms: subsampling, delta encoding, rearrangement

use std::num::NonZeroUsize;
use tracing::debug;

use super::error::TransformError;
use super::traits::{DataTransform, array_field, ensure_width};
use crate::error::BuildError;
use crate::record::{Record, Value};

/// Expand a run-length mask into boolean flags
///
/// A positive `n` contributes `n` true flags and a negative `-n` contributes
/// `n` false flags, so `[6, -1, 6, -1]` yields 14 flags. Zero is rejected.
pub fn make_bool_mask(runs: &[i32]) -> Result<Vec<bool>, BuildError> {
    debug!(?runs, "make_bool_mask: called");
    let mut mask = Vec::new();
    for &run in runs {
        if run == 0 {
            return Err(BuildError::invalid("mask", "mask runs must be non-zero"));
        }
        mask.extend(std::iter::repeat_n(run > 0, run.unsigned_abs() as usize));
    }
    Ok(mask)
}

/// Keeps every `stride`-th timestep of `actions`
///
/// Applied in both directions with the same stride so model-side and
/// dataset-side action chunks index the same timesteps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleActions {
    stride: NonZeroUsize,
}

impl SubsampleActions {
    pub fn new(stride: NonZeroUsize) -> Self {
        Self { stride }
    }

    pub fn stride(&self) -> usize {
        self.stride.get()
    }

    /// Timestep in the original sequence that retained row `k` came from
    pub fn source_index(&self, k: usize) -> usize {
        k * self.stride.get()
    }

    /// Number of rows kept from a sequence of length `len`
    pub fn retained_len(&self, len: usize) -> usize {
        len.div_ceil(self.stride.get())
    }
}

impl DataTransform for SubsampleActions {
    fn name(&self) -> &'static str {
        "subsample_actions"
    }

    fn apply(&self, mut record: Record) -> Result<Record, TransformError> {
        if !record.contains_key("actions") {
            return Ok(record);
        }
        let actions = array_field(&record, "actions", self.name())?.stride_rows(self.stride.get());
        record.insert("actions".to_string(), actions.into());
        Ok(record)
    }
}

/// Shared body of the delta/absolute pair: `actions[t][d] += sign * state[d]` on masked dims
fn shift_by_state(
    mut record: Record,
    mask: &[bool],
    sign: f32,
    transform: &'static str,
) -> Result<Record, TransformError> {
    if !record.contains_key("actions") {
        return Ok(record);
    }
    let dims = mask.len();
    let state = array_field(&record, "state", transform)?;
    ensure_width(state, dims, "state", transform)?;
    let Some(state_row) = state.rows().next().filter(|row| row.len() >= dims) else {
        return Err(TransformError::ShapeMismatch {
            transform,
            field: "state".to_string(),
            needed: dims,
            actual: 0,
        });
    };
    let offsets: Vec<f32> = state_row[..dims]
        .iter()
        .zip(mask)
        .map(|(&s, &m)| if m { sign * s } else { 0.0 })
        .collect();

    let mut actions = array_field(&record, "actions", transform)?.clone();
    ensure_width(&actions, dims, "actions", transform)?;
    for row in actions.rows_mut() {
        for (a, off) in row.iter_mut().zip(&offsets) {
            *a += off;
        }
    }
    record.insert("actions".to_string(), Value::Array(actions));
    Ok(record)
}

/// Re-expresses masked action dims relative to the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaActions {
    mask: Vec<bool>,
}

impl DeltaActions {
    pub fn new(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

impl DataTransform for DeltaActions {
    fn name(&self) -> &'static str {
        "delta_actions"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        shift_by_state(record, &self.mask, -1.0, self.name())
    }
}

/// Inverse of [`DeltaActions`]: adds the state back onto masked dims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteActions {
    mask: Vec<bool>,
}

impl AbsoluteActions {
    pub fn new(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

impl DataTransform for AbsoluteActions {
    fn name(&self) -> &'static str {
        "absolute_actions"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        shift_by_state(record, &self.mask, 1.0, self.name())
    }
}

/// Reorders the leading action dims: `out[i] = in[indices[i]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RearrangeActions {
    indices: Vec<usize>,
}

impl RearrangeActions {
    /// `indices` must be a permutation of `0..indices.len()`
    pub fn new(indices: Vec<usize>) -> Result<Self, BuildError> {
        let mut seen = vec![false; indices.len()];
        for &i in &indices {
            if i >= indices.len() || seen[i] {
                return Err(BuildError::invalid(
                    "rearrange_action_indices",
                    format!("{:?} is not a permutation of 0..{}", indices, indices.len()),
                ));
            }
            seen[i] = true;
        }
        Ok(Self { indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Transform undoing this rearrangement
    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.indices.len()];
        for (i, &src) in self.indices.iter().enumerate() {
            inverse[src] = i;
        }
        Self { indices: inverse }
    }
}

impl DataTransform for RearrangeActions {
    fn name(&self) -> &'static str {
        "rearrange_actions"
    }

    fn apply(&self, mut record: Record) -> Result<Record, TransformError> {
        if !record.contains_key("actions") {
            return Ok(record);
        }
        let mut actions = array_field(&record, "actions", self.name())?.clone();
        ensure_width(&actions, self.indices.len(), "actions", self.name())?;
        let k = self.indices.len();
        for row in actions.rows_mut() {
            let src: Vec<f32> = row[..k].to_vec();
            for (dst, &i) in row[..k].iter_mut().zip(&self.indices) {
                *dst = src[i];
            }
        }
        record.insert("actions".to_string(), actions.into());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::TransformGroup;
    use crate::record::Array;
    use crate::transforms::apply_chain;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn record(state: Vec<f32>, actions: Vec<Vec<f32>>) -> Record {
        let mut r = Record::new();
        r.insert("state".into(), Array::vector(state).into());
        r.insert("actions".into(), Array::from_rows(actions).unwrap().into());
        r
    }

    fn actions_of(r: &Record) -> Vec<f32> {
        r["actions"].as_array().unwrap().data().to_vec()
    }

    #[test]
    fn test_make_bool_mask() {
        let mask = make_bool_mask(&[2, -1, 1]).unwrap();
        assert_eq!(mask, vec![true, true, false, true]);
        assert_eq!(make_bool_mask(&[6, -1, 6, -1]).unwrap().len(), 14);
    }

    #[test]
    fn test_make_bool_mask_rejects_zero() {
        let err = make_bool_mask(&[3, 0]).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_subsample_keeps_every_nth() {
        let t = SubsampleActions::new(NonZeroUsize::new(3).unwrap());
        let r = record(vec![0.0], (0..7).map(|i| vec![i as f32]).collect());
        let out = t.apply(r).unwrap();
        assert_eq!(actions_of(&out), vec![0.0, 3.0, 6.0]);
        assert_eq!(t.retained_len(7), 3);
    }

    #[test]
    fn test_subsample_without_actions_is_noop() {
        let t = SubsampleActions::new(NonZeroUsize::new(2).unwrap());
        let mut r = Record::new();
        r.insert("prompt".into(), Value::from("x"));
        assert_eq!(t.apply(r.clone()).unwrap(), r);
    }

    #[test]
    fn test_delta_only_touches_masked_dims() {
        let r = record(vec![1.0, 10.0, 100.0], vec![vec![2.0, 20.0, 200.0, 7.0]]);
        let out = DeltaActions::new(vec![true, false, true]).apply(r).unwrap();
        assert_eq!(actions_of(&out), vec![1.0, 20.0, 100.0, 7.0]);
    }

    #[test]
    fn test_absolute_requires_state() {
        let mut r = Record::new();
        r.insert("actions".into(), Array::from_rows(vec![vec![1.0]]).unwrap().into());
        let err = AbsoluteActions::new(vec![true]).apply(r).unwrap_err();
        assert!(matches!(err, TransformError::MissingField { ref field, .. } if field == "state"));
    }

    #[test]
    fn test_delta_mask_wider_than_actions() {
        let r = record(vec![0.0; 4], vec![vec![0.0; 2]]);
        let err = DeltaActions::new(vec![true; 4]).apply(r).unwrap_err();
        assert!(matches!(err, TransformError::ShapeMismatch { needed: 4, actual: 2, .. }));
    }

    #[test]
    fn test_delta_with_empty_state_is_error() {
        // Zero-width state
        let mut r = Record::new();
        r.insert("state".into(), Array::vector(vec![]).into());
        r.insert("actions".into(), Array::from_rows(vec![vec![1.0; 3]]).unwrap().into());
        let err = DeltaActions::new(vec![true; 3]).apply(r).unwrap_err();
        assert!(matches!(err, TransformError::ShapeMismatch { needed: 3, actual: 0, .. }));

        // Wide enough on paper but holding no values
        let mut r = Record::new();
        r.insert("state".into(), Array::new(vec![0, 3], vec![]).unwrap().into());
        r.insert("actions".into(), Array::from_rows(vec![vec![1.0; 3]]).unwrap().into());
        let err = AbsoluteActions::new(vec![true; 3]).apply(r).unwrap_err();
        assert!(matches!(err, TransformError::ShapeMismatch { needed: 3, actual: 0, .. }));
    }

    #[test]
    fn test_delta_after_padding_empty_state() {
        let state = Array::vector(vec![]).pad_to_dim(3);
        let r = record(state.data().to_vec(), vec![vec![4.0, 5.0, 6.0]]);
        let out = DeltaActions::new(vec![true; 3]).apply(r).unwrap();
        assert_eq!(actions_of(&out), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_rearrange_and_inverse() {
        let t = RearrangeActions::new(vec![2, 0, 1]).unwrap();
        let r = record(vec![0.0], vec![vec![10.0, 11.0, 12.0, 13.0]]);
        let out = t.apply(r.clone()).unwrap();
        assert_eq!(actions_of(&out), vec![12.0, 10.0, 11.0, 13.0]);

        let back = t.inverse().apply(out).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_rearrange_rejects_non_permutation() {
        assert!(RearrangeActions::new(vec![0, 0, 1]).is_err());
        assert!(RearrangeActions::new(vec![0, 3]).is_err());
    }

    proptest! {
        #[test]
        fn prop_delta_round_trip_exact_on_integers(
            runs in prop::collection::vec((1i32..4, any::<bool>()), 1..5),
            seed in prop::collection::vec(-1000i32..1000, 64),
            horizon in 1usize..6,
        ) {
            let runs: Vec<i32> = runs.into_iter().map(|(n, on)| if on { n } else { -n }).collect();
            let mask = make_bool_mask(&runs).unwrap();
            let dims = mask.len();
            let state: Vec<f32> = (0..dims).map(|d| seed[d % seed.len()] as f32).collect();
            let actions: Vec<Vec<f32>> = (0..horizon)
                .map(|t| (0..dims).map(|d| seed[(t * dims + d + 7) % seed.len()] as f32).collect())
                .collect();
            let original = record(state, actions);

            let encoded = DeltaActions::new(mask.clone()).apply(original.clone()).unwrap();
            let decoded = AbsoluteActions::new(mask).apply(encoded).unwrap();
            prop_assert_eq!(decoded, original);
        }

        #[test]
        fn prop_delta_round_trip_within_tolerance(
            state in prop::collection::vec(-10.0f32..10.0, 6),
            actions in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 6), 1..8),
            mask in prop::collection::vec(any::<bool>(), 6),
        ) {
            let original = record(state, actions);
            let encoded = DeltaActions::new(mask.clone()).apply(original.clone()).unwrap();
            let decoded = AbsoluteActions::new(mask).apply(encoded).unwrap();
            for (a, b) in actions_of(&decoded).iter().zip(actions_of(&original)) {
                prop_assert!((a - b).abs() <= 1e-5);
            }
        }

        #[test]
        fn prop_subsample_rows_map_to_source_index(len in 1usize..40, stride in 1usize..6) {
            let t = SubsampleActions::new(NonZeroUsize::new(stride).unwrap());
            let rows: Vec<Vec<f32>> = (0..len).map(|i| vec![i as f32, (i * 2) as f32]).collect();
            let out = t.apply(record(vec![0.0], rows.clone())).unwrap();
            let kept = out["actions"].as_array().unwrap();

            prop_assert_eq!(kept.shape()[0], t.retained_len(len));
            for (k, row) in kept.rows().enumerate() {
                prop_assert_eq!(row, rows[t.source_index(k)].as_slice());
            }
        }

        #[test]
        fn prop_subsample_stage_round_trip_index_map(len in 1usize..60, stride in 2usize..6) {
            let t = SubsampleActions::new(NonZeroUsize::new(stride).unwrap());
            let stage = TransformGroup::default().push(vec![Arc::new(t)], vec![Arc::new(t)]);
            let rows: Vec<Vec<f32>> = (0..len).map(|i| vec![i as f32, -(i as f32)]).collect();

            let model_input = apply_chain(&stage.inputs, record(vec![0.0], rows.clone())).unwrap();
            let restored = apply_chain(&stage.outputs, model_input).unwrap();
            let restored = restored["actions"].as_array().unwrap();

            // Both directions decimate, so restored row k is timestep k * stride^2
            prop_assert_eq!(restored.shape()[0], t.retained_len(t.retained_len(len)));
            for (k, row) in restored.rows().enumerate() {
                prop_assert_eq!(row, rows[t.source_index(t.source_index(k))].as_slice());
                prop_assert_eq!(row[0] as usize, k * stride * stride);
            }
        }
    }
}
