//! Feature Schema - Ordered feature contract
//!
//! **This manifest controls the vector layout**
//!
//! The manifest lists one feature name per line. Its order defines the index
//! of every feature in the vector handed to normalization and inference, so
//! it is loaded exactly once at startup and never reloaded.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::Serialize;

use super::record::FlowRecord;
use super::vector::FeatureVector;

// ============================================================================
// ERRORS
// ============================================================================

/// Schema manifest could not be turned into a usable schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("feature manifest {path} unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("feature manifest {0} lists no features")]
    Empty(PathBuf),

    #[error("feature `{0}` listed twice in manifest")]
    DuplicateFeature(String),
}

/// A schema feature is absent from an otherwise well-formed record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("missing feature in input: {0}")]
    Missing(String),
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Ordered, unique list of feature names
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSchema {
    names: Vec<String>,
    layout_hash: u32,
}

impl FeatureSchema {
    /// Load schema from a manifest file (one name per line)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let names: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(SchemaError::Empty(path.to_path_buf()));
        }

        let schema = Self::from_names(names)?;
        tracing::info!(
            "Loaded {} feature names from {} (layout {:08x})",
            schema.len(),
            path.display(),
            schema.layout_hash
        );
        Ok(schema)
    }

    /// Build a schema from names already in memory
    pub fn from_names<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateFeature(name.clone()));
            }
        }

        let layout_hash = compute_layout_hash(&names);
        Ok(Self { names, layout_hash })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// CRC32 of the ordered names, identifies this exact layout
    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    /// Get feature index by name (O(n) but features are few)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Project a validated record onto the schema order.
    ///
    /// Fails on the first schema feature the record does not carry.
    pub fn project(&self, record: &FlowRecord) -> Result<FeatureVector, FeatureError> {
        let mut values = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let value = record
                .feature(name)
                .ok_or_else(|| FeatureError::Missing(name.clone()))?;
            values.push(value);
        }
        Ok(FeatureVector::new(values, self.layout_hash))
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

fn compute_layout_hash(names: &[String]) -> u32 {
    let mut hasher = Hasher::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }
    hasher.finalize()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn manifest(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_skips_blank_lines() {
        let file = manifest("time_start\n\n  src_port  \r\ndst_port\n\n");
        let schema = FeatureSchema::load(file.path()).unwrap();

        assert_eq!(schema.names(), &["time_start", "src_port", "dst_port"]);
        assert_eq!(schema.index_of("src_port"), Some(1));
        assert_eq!(schema.index_of("nonexistent"), None);
    }

    #[test]
    fn test_missing_manifest_is_unavailable() {
        let result = FeatureSchema::load("/definitely/not/here/features.txt");
        assert!(matches!(result, Err(SchemaError::Unreadable { .. })));
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let file = manifest("\n \n");
        assert!(matches!(FeatureSchema::load(file.path()), Err(SchemaError::Empty(_))));
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let result = FeatureSchema::from_names(["a", "b", "a"]);
        assert!(matches!(result, Err(SchemaError::DuplicateFeature(name)) if name == "a"));
    }

    #[test]
    fn test_layout_hash_depends_on_order() {
        let ab = FeatureSchema::from_names(["a", "b"]).unwrap();
        let ba = FeatureSchema::from_names(["b", "a"]).unwrap();
        let ab_again = FeatureSchema::from_names(["a", "b"]).unwrap();

        assert_ne!(ab.layout_hash(), ba.layout_hash());
        assert_eq!(ab.layout_hash(), ab_again.layout_hash());
    }

    #[test]
    fn test_separator_prevents_concatenation_collisions() {
        let joined = FeatureSchema::from_names(["ab", "c"]).unwrap();
        let split = FeatureSchema::from_names(["a", "bc"]).unwrap();
        assert_ne!(joined.layout_hash(), split.layout_hash());
    }
}
