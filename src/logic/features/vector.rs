//! Feature Vector - Core data structure for ML input
//!
//! Values are in the exact order of the `FeatureSchema` they were projected
//! through; the layout hash records which schema that was.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    /// CRC32 hash of the feature layout (for mismatch detection)
    layout_hash: u32,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new(values: Vec<f64>, layout_hash: u32) -> Self {
        Self { layout_hash, values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }
}
