//! Key remapping from dataset field names to canonical names

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::error::TransformError;
use super::traits::DataTransform;
use crate::error::BuildError;
use crate::record::Record;

/// Ordered mapping from target (model-facing) key to source (dataset) key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRemapSpec {
    pairs: Vec<(String, String)>,
}

impl KeyRemapSpec {
    /// Build a remap spec, rejecting empty maps and duplicate targets
    pub fn new<T, S>(pairs: impl IntoIterator<Item = (T, S)>) -> Result<Self, BuildError>
    where
        T: Into<String>,
        S: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs.into_iter().map(|(t, s)| (t.into(), s.into())).collect();
        if pairs.is_empty() {
            return Err(BuildError::invalid("repack", "key map is empty"));
        }
        let mut seen = HashSet::new();
        for (target, _) in &pairs {
            if !seen.insert(target.as_str()) {
                return Err(BuildError::invalid("repack", format!("duplicate target key '{}'", target)));
            }
        }
        debug!(len = pairs.len(), "KeyRemapSpec::new: validated");
        Ok(Self { pairs })
    }

    /// Mapping used by the Behavior (B1K) LeRobot dataset
    pub fn behavior() -> Self {
        Self {
            pairs: [
                ("observation/egocentric_camera", "observation.images.rgb.head"),
                ("observation/wrist_image_left", "observation.images.rgb.left_wrist"),
                ("observation/wrist_image_right", "observation.images.rgb.right_wrist"),
                ("observation/state", "observation.state"),
                ("actions", "action"),
                ("prompt", "prompt"),
            ]
            .into_iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect(),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Source key feeding `target`, if mapped
    pub fn source_of(&self, target: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, s)| s.as_str())
    }
}

impl Default for KeyRemapSpec {
    fn default() -> Self {
        Self::behavior()
    }
}

impl Serialize for KeyRemapSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (target, source) in &self.pairs {
            map.serialize_entry(target, source)?;
        }
        map.end()
    }
}

struct KeyRemapVisitor;

impl<'de> Visitor<'de> for KeyRemapVisitor {
    type Value = KeyRemapSpec;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of target key to source key")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        while let Some((target, source)) = access.next_entry::<String, String>()? {
            pairs.push((target, source));
        }
        KeyRemapSpec::new(pairs).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for KeyRemapSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(KeyRemapVisitor)
    }
}

/// Renames and selects record fields per a [`KeyRemapSpec`]
///
/// The output holds exactly the target keys; unmapped source fields are
/// dropped. Runs in the input direction only.
#[derive(Debug, Clone)]
pub struct RepackTransform {
    spec: KeyRemapSpec,
}

impl RepackTransform {
    pub fn new(spec: KeyRemapSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &KeyRemapSpec {
        &self.spec
    }
}

impl DataTransform for RepackTransform {
    fn name(&self) -> &'static str {
        "repack"
    }

    fn apply(&self, mut record: Record) -> Result<Record, TransformError> {
        let mut out = Record::new();
        for (target, source) in &self.spec.pairs {
            // A source feeding several targets is cloned
            let value = if self.spec.pairs.iter().filter(|(_, s)| s == source).count() > 1 {
                record.get(source).cloned()
            } else {
                record.remove(source)
            };
            let value = value.ok_or_else(|| TransformError::MissingField {
                transform: "repack",
                field: source.clone(),
            })?;
            out.insert(target.clone(), value);
        }
        Ok(out)
    }
}
