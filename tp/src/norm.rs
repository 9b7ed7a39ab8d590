//! Normalization statistics
//!
//! Stats are stored per field in `norm_stats.json`:
//!
//! ```text
//! {"norm_stats": {"state": {"mean": [..], "std": [..], "q01": [..], "q99": [..]}, "actions": {..}}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::BuildError;

/// File name of the stats inside an asset directory
pub const NORM_STATS_FILE: &str = "norm_stats.json";

/// Per-dimension statistics for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q01: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q99: Option<Vec<f32>>,
}

impl NormStats {
    /// Number of leading dims covered
    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    pub fn has_quantiles(&self) -> bool {
        self.q01.is_some() && self.q99.is_some()
    }

    /// Require every per-dim vector to cover the same number of dims
    pub(crate) fn check(&self, key: &str) -> Result<(), BuildError> {
        let dims = self.dims();
        let lens = [
            Some(self.std.len()),
            self.q01.as_ref().map(Vec::len),
            self.q99.as_ref().map(Vec::len),
        ];
        if lens.into_iter().flatten().any(|len| len != dims) {
            return Err(BuildError::invalid(
                "norm_stats",
                format!("stats for '{}' have inconsistent lengths", key),
            ));
        }
        Ok(())
    }
}

/// Stats keyed by field name
pub type NormStatsMap = BTreeMap<String, NormStats>;

#[derive(Serialize, Deserialize)]
struct NormStatsFile {
    norm_stats: NormStatsMap,
}

/// Load stats from `dir/norm_stats.json`
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_norm_stats(dir: &Path) -> Result<Option<NormStatsMap>, BuildError> {
    let path = dir.join(NORM_STATS_FILE);
    debug!(?path, "load_norm_stats: called");
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|e| BuildError::factory("norm stats", e))?;
    let file: NormStatsFile = serde_json::from_str(&content).map_err(|e| BuildError::factory("norm stats", e))?;
    for (key, stats) in &file.norm_stats {
        stats.check(key)?;
    }
    info!(path = %path.display(), keys = file.norm_stats.len(), "Loaded norm stats");
    Ok(Some(file.norm_stats))
}

/// Write stats to `dir/norm_stats.json`
pub fn save_norm_stats(dir: &Path, stats: &NormStatsMap) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let file = NormStatsFile {
        norm_stats: stats.clone(),
    };
    let content = serde_json::to_string_pretty(&file)?;
    fs::write(dir.join(NORM_STATS_FILE), content)
}
