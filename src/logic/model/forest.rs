//! Fallback Forest - two-feature tree ensemble
//!
//! Low-fidelity classifier over packet count and byte count, serialized as
//! JSON. Each tree is a flat node list; the class-1 probability is the mean of
//! the leaf values reached in every tree.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Input arity: packet count, byte count
pub const FOREST_INPUTS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    #[error("fallback model unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("fallback model is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fallback model invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForestNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestTree {
    pub nodes: Vec<ForestNode>,
}

impl ForestTree {
    fn validate(&self, tree_idx: usize) -> Result<(), ForestError> {
        let invalid = |msg: String| ForestError::Invalid(format!("tree {}: {}", tree_idx, msg));

        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                ForestNode::Split { feature, left, right, .. } => {
                    if feature >= FOREST_INPUTS {
                        return Err(invalid(format!("node {} reads feature {}", idx, feature)));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(invalid(format!("node {} has child {}", idx, child)));
                        }
                    }
                }
                ForestNode::Leaf { value } => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(invalid(format!("leaf {} value {} outside [0, 1]", idx, value)));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64; FOREST_INPUTS]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                ForestNode::Split { feature, threshold, left, right } => {
                    idx = if x[feature] <= threshold { left } else { right };
                }
                ForestNode::Leaf { value } => return value,
            }
        }
    }
}

/// Statistical fallback classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackForest {
    pub name: String,
    pub trees: Vec<ForestTree>,
}

impl FallbackForest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let forest = Self::from_json(&content)?;
        tracing::info!(
            "Loaded fallback forest `{}` ({} trees) from {}",
            forest.name,
            forest.trees.len(),
            path.display()
        );
        Ok(forest)
    }

    pub fn from_json(content: &str) -> Result<Self, ForestError> {
        let forest: FallbackForest = serde_json::from_str(content)?;
        forest.validate()?;
        Ok(forest)
    }

    fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::Invalid("forest has no trees".to_string()));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx)?;
        }
        Ok(())
    }

    /// Mean class-1 probability over all trees
    pub fn predict_proba(&self, packets: f64, bytes: f64) -> f64 {
        let x = [packets, bytes];
        let sum: f64 = self.trees.iter().map(|t| t.predict(&x)).sum();
        sum / self.trees.len() as f64
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
