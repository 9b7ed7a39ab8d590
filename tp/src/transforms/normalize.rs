//! Normalize / Unnormalize transforms

use tracing::debug;

use super::error::TransformError;
use super::traits::{DataTransform, array_field};
use crate::error::BuildError;
use crate::norm::{NormStats, NormStatsMap};
use crate::record::{Record, Value};

const EPS: f32 = 1e-6;

fn check_stats(stats: &NormStatsMap, use_quantiles: bool) -> Result<(), BuildError> {
    for (key, s) in stats {
        s.check(key)?;
    }
    if !use_quantiles {
        return Ok(());
    }
    if let Some((key, _)) = stats.iter().find(|(_, s)| !s.has_quantiles()) {
        return Err(BuildError::invalid(
            "norm_stats",
            format!("quantile normalization needs q01/q99 for '{}'", key),
        ));
    }
    Ok(())
}

/// Apply `f(x, stats, d)` to the leading dims of every field that has stats
fn map_fields(
    mut record: Record,
    stats: &NormStatsMap,
    transform: &'static str,
    f: impl Fn(f32, &NormStats, usize) -> f32,
) -> Result<Record, TransformError> {
    for (key, s) in stats {
        if !record.contains_key(key) {
            continue;
        }
        let mut array = array_field(&record, key, transform)?.clone();
        let dims = s.dims().min(array.last_dim());
        for row in array.rows_mut() {
            for (d, x) in row[..dims].iter_mut().enumerate() {
                *x = f(*x, s, d);
            }
        }
        record.insert(key.clone(), Value::Array(array));
    }
    Ok(record)
}

fn quantiles(s: &NormStats, d: usize) -> (f32, f32) {
    // Presence is checked at construction
    let q01 = s.q01.as_ref().map_or(0.0, |q| q[d]);
    let q99 = s.q99.as_ref().map_or(0.0, |q| q[d]);
    (q01, q99)
}

/// Scales fields into a normalized range
#[derive(Debug, Clone)]
pub struct Normalize {
    stats: NormStatsMap,
    use_quantiles: bool,
}

impl Normalize {
    pub fn new(stats: NormStatsMap, use_quantiles: bool) -> Result<Self, BuildError> {
        debug!(keys = stats.len(), use_quantiles, "Normalize::new: called");
        check_stats(&stats, use_quantiles)?;
        Ok(Self { stats, use_quantiles })
    }
}

impl DataTransform for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        if self.use_quantiles {
            map_fields(record, &self.stats, self.name(), |x, s, d| {
                let (q01, q99) = quantiles(s, d);
                (x - q01) / (q99 - q01 + EPS) * 2.0 - 1.0
            })
        } else {
            map_fields(record, &self.stats, self.name(), |x, s, d| (x - s.mean[d]) / (s.std[d] + EPS))
        }
    }
}

/// Inverse of [`Normalize`]
#[derive(Debug, Clone)]
pub struct Unnormalize {
    stats: NormStatsMap,
    use_quantiles: bool,
}

impl Unnormalize {
    pub fn new(stats: NormStatsMap, use_quantiles: bool) -> Result<Self, BuildError> {
        check_stats(&stats, use_quantiles)?;
        Ok(Self { stats, use_quantiles })
    }
}

impl DataTransform for Unnormalize {
    fn name(&self) -> &'static str {
        "unnormalize"
    }

    fn apply(&self, record: Record) -> Result<Record, TransformError> {
        if self.use_quantiles {
            map_fields(record, &self.stats, self.name(), |x, s, d| {
                let (q01, q99) = quantiles(s, d);
                (x + 1.0) / 2.0 * (q99 - q01 + EPS) + q01
            })
        } else {
            map_fields(record, &self.stats, self.name(), |x, s, d| x * (s.std[d] + EPS) + s.mean[d])
        }
    }
}
