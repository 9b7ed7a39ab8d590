//! Record and value types flowing through a transform pipeline
//!
//! A [`Record`] is one dataset sample: a flat map from field name to [`Value`].
//! Field names are flat keys, so `"observation/state"` is a single key rather
//! than a nested path. Numeric payloads are [`Array`]s stored row-major as
//! `f32` alongside their shape and element type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// One dataset sample, keyed by field name
pub type Record = BTreeMap<String, Value>;

/// Errors from constructing or reshaping arrays
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayError {
    #[error("shape {shape:?} holds {expected} elements but {actual} were given")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("ragged rows: row {row} has {actual} elements, expected {expected}")]
    RaggedRows { row: usize, expected: usize, actual: usize },
}

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    #[default]
    F32,
    U8,
}

#[derive(Deserialize)]
struct ArrayRepr {
    shape: Vec<usize>,
    data: Vec<f32>,
    #[serde(default)]
    dtype: DType,
}

/// Dense row-major array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArrayRepr")]
pub struct Array {
    shape: Vec<usize>,
    data: Vec<f32>,
    #[serde(skip_serializing_if = "is_f32")]
    dtype: DType,
}

fn is_f32(dtype: &DType) -> bool {
    *dtype == DType::F32
}

impl TryFrom<ArrayRepr> for Array {
    type Error = ArrayError;

    fn try_from(repr: ArrayRepr) -> Result<Self, Self::Error> {
        Ok(Self::new(repr.shape, repr.data)?.with_dtype(repr.dtype))
    }
}

impl Array {
    /// Create an array, checking that `data` fills `shape` exactly
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, ArrayError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ArrayError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            dtype: DType::F32,
        })
    }

    /// 1-D array
    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
            dtype: DType::F32,
        }
    }

    /// 2-D array from equally sized rows
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ArrayError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * width);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(ArrayError::RaggedRows {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Self::new(vec![rows.len(), width], data)
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Size of the last axis (1 for scalars)
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Rows along the last axis, e.g. one per timestep of an action chunk
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.last_dim().max(1))
    }

    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        let width = self.last_dim().max(1);
        self.data.chunks_exact_mut(width)
    }

    /// Zero-pad the last axis up to `dim`; unchanged when already at least `dim` wide
    pub fn pad_to_dim(&self, dim: usize) -> Self {
        let width = self.last_dim();
        if width >= dim {
            return self.clone();
        }
        debug!(from = width, to = dim, "Array::pad_to_dim: padding last axis");
        let outer: usize = self.shape[..self.shape.len().saturating_sub(1)].iter().product();
        let mut data = Vec::with_capacity(outer * dim);
        if width == 0 {
            // No rows to walk; every padded row is all zeros
            data.resize(outer * dim, 0.0);
        } else {
            for row in self.rows() {
                data.extend_from_slice(row);
                data.resize(data.len() + (dim - width), 0.0);
            }
        }
        let mut shape = self.shape.clone();
        match shape.last_mut() {
            Some(last) => *last = dim,
            None => shape.push(dim),
        }
        Self {
            shape,
            data,
            dtype: self.dtype,
        }
    }

    /// Keep only the first `dim` entries of the last axis
    pub fn truncate_last(&self, dim: usize) -> Self {
        let width = self.last_dim();
        if width <= dim {
            return self.clone();
        }
        let data = self.rows().flat_map(|row| row[..dim].iter().copied()).collect();
        let mut shape = self.shape.clone();
        if let Some(last) = shape.last_mut() {
            *last = dim;
        }
        Self {
            shape,
            data,
            dtype: self.dtype,
        }
    }

    /// Keep every `stride`-th element of axis 0
    ///
    /// `stride` must be non-zero.
    pub fn stride_rows(&self, stride: usize) -> Self {
        let Some(&len) = self.shape.first() else {
            return self.clone();
        };
        let inner: usize = self.shape[1..].iter().product();
        let data: Vec<f32> = (0..len)
            .step_by(stride)
            .flat_map(|i| self.data[i * inner..(i + 1) * inner].iter().copied())
            .collect();
        let mut shape = self.shape.clone();
        shape[0] = len.div_ceil(stride);
        Self {
            shape,
            data,
            dtype: self.dtype,
        }
    }

    /// Convert an image into u8-valued HWC layout
    ///
    /// Float images are scaled by 255 and truncated into `[0, 255]`. A leading
    /// axis of 3 on a 3-D array is taken as channels-first.
    pub fn to_image_hwc(&self) -> Self {
        let mut image = self.clone();
        if image.dtype == DType::F32 {
            for v in image.data.iter_mut() {
                *v = ((*v * 255.0).clamp(0.0, 255.0) as u8) as f32;
            }
            image.dtype = DType::U8;
        }
        if image.shape.len() == 3 && image.shape[0] == 3 {
            let (c, h, w) = (image.shape[0], image.shape[1], image.shape[2]);
            let mut data = vec![0.0; image.data.len()];
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        data[(y * w + x) * c + ch] = image.data[(ch * h + y) * w + x];
                    }
                }
            }
            image.data = data;
            image.shape = vec![h, w, c];
        }
        image
    }
}

/// A field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Scalar(f32),
    Text(String),
    Array(Array),
    Map(Record),
}

impl Value {
    /// Short type name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Scalar(_) => "scalar",
            Self::Text(_) => "text",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Scalar(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Array(a) => write!(f, "array{:?}", a.shape()),
            Self::Map(m) => write!(f, "map[{}]", m.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_element_count() {
        let err = Array::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            ArrayError::ShapeMismatch {
                shape: vec![2, 3],
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Array::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, ArrayError::RaggedRows { row: 1, .. }));
    }

    #[test]
    fn test_pad_to_dim() {
        let a = Array::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let padded = a.pad_to_dim(4);
        assert_eq!(padded.shape(), &[2, 4]);
        assert_eq!(padded.data(), &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);

        // Already wide enough
        assert_eq!(a.pad_to_dim(1), a);
    }

    #[test]
    fn test_pad_zero_width_fills_zeros() {
        let empty = Array::new(vec![2, 0], vec![]).unwrap();
        let padded = empty.pad_to_dim(4);
        assert_eq!(padded.shape(), &[2, 4]);
        assert_eq!(padded.data(), &[0.0; 8]);

        let state = Array::vector(vec![]).pad_to_dim(3);
        assert_eq!(state.shape(), &[3]);
        assert_eq!(state.data(), &[0.0; 3]);

        // No rows at all stays empty
        let no_rows = Array::new(vec![0, 2], vec![]).unwrap().pad_to_dim(5);
        assert_eq!(no_rows.shape(), &[0, 5]);
        assert!(no_rows.data().is_empty());
    }

    #[test]
    fn test_truncate_last() {
        let a = Array::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let t = a.truncate_last(2);
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.data(), &[1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_stride_rows() {
        let a = Array::from_rows((0..5).map(|i| vec![i as f32, -(i as f32)]).collect()).unwrap();
        let s = a.stride_rows(2);
        assert_eq!(s.shape(), &[3, 2]);
        assert_eq!(s.data(), &[0.0, -0.0, 2.0, -2.0, 4.0, -4.0]);
    }

    #[test]
    fn test_image_chw_to_hwc() {
        // 3 channels, 1x2 pixels
        let chw = Array::new(vec![3, 1, 2], vec![0.0, 1.0, 0.5, 0.5, 1.0, 0.0]).unwrap();
        let hwc = chw.to_image_hwc();
        assert_eq!(hwc.shape(), &[1, 2, 3]);
        assert_eq!(hwc.dtype(), DType::U8);
        assert_eq!(hwc.data(), &[0.0, 127.0, 255.0, 255.0, 127.0, 0.0]);
    }

    #[test]
    fn test_u8_image_kept() {
        let hwc = Array::new(vec![1, 1, 3], vec![10.0, 20.0, 30.0]).unwrap().with_dtype(DType::U8);
        assert_eq!(hwc.to_image_hwc(), hwc);
    }

    #[test]
    fn test_value_json_round_trip() {
        let json = r#"{"shape":[2],"data":[1.5,2.5]}"#;
        let v: Value = serde_json::from_str(json).unwrap();
        assert_eq!(v, Value::Array(Array::vector(vec![1.5, 2.5])));

        let text: Value = serde_json::from_str(r#""pick up the cup""#).unwrap();
        assert_eq!(text, Value::from("pick up the cup"));
    }

    #[test]
    fn test_json_array_with_bad_shape_rejected() {
        let json = r#"{"shape":[3],"data":[1.0]}"#;
        assert!(serde_json::from_str::<Value>(json).is_err());
    }
}
