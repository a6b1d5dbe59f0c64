//! Boosted Tree Model - LightGBM text format
//!
//! Native evaluator for models saved with `Booster.save_model()`. Only binary
//! classification is supported: the raw score is the sum of every tree's leaf
//! output, mapped to a class-1 probability through the model's sigmoid.
//!
//! # Tree encoding
//! Internal nodes are indexed from 0. A negative child index `c` points at
//! leaf `!c` (i.e. `-c - 1`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Values within this distance of zero count as zero for missing-type Zero
const ZERO_THRESHOLD: f64 = 1e-35;

const CATEGORICAL_MASK: u8 = 1;
const DEFAULT_LEFT_MASK: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed model at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("unsupported model: {0}")]
    Unsupported(String),

    #[error("model uses feature index {index} but schema has {schema_len} features")]
    FeatureOutOfRange { index: usize, schema_len: usize },
}

/// How raw scores become a probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// `binary sigmoid:<k>`
    Binary { sigmoid: f64 },
    /// `cross_entropy` / `xentropy`
    CrossEntropy,
}

impl Objective {
    fn parse(value: &str, line: usize) -> Result<Self, ModelError> {
        let mut parts = value.split_whitespace();
        let name = parts.next().unwrap_or_default();
        match name {
            "binary" => {
                let mut sigmoid = 1.0;
                for part in parts {
                    if let Some(k) = part.strip_prefix("sigmoid:") {
                        sigmoid = k.parse().map_err(|_| ModelError::Malformed {
                            line,
                            message: format!("bad sigmoid `{}`", k),
                        })?;
                    }
                }
                Ok(Self::Binary { sigmoid })
            }
            "cross_entropy" | "xentropy" => Ok(Self::CrossEntropy),
            other => Err(ModelError::Unsupported(format!("objective `{}`", other))),
        }
    }

    fn probability(&self, raw: f64) -> f64 {
        let k = match self {
            Self::Binary { sigmoid } => *sigmoid,
            Self::CrossEntropy => 1.0,
        };
        1.0 / (1.0 + (-k * raw).exp())
    }
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    decision_type: Vec<u8>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
    cat_boundaries: Vec<usize>,
    cat_threshold: Vec<u32>,
}

impl Tree {
    fn from_fields(fields: &HashMap<String, String>, line: usize) -> Result<Self, ModelError> {
        if field(fields, "is_linear", line)?.unwrap_or(0u8) != 0 {
            return Err(ModelError::Unsupported("linear trees".to_string()));
        }

        let num_leaves: usize = field(fields, "num_leaves", line)?.ok_or_else(|| {
            ModelError::Malformed { line, message: "tree without num_leaves".to_string() }
        })?;
        let num_cat: usize = field(fields, "num_cat", line)?.unwrap_or(0);

        let tree = Tree {
            split_feature: list(fields, "split_feature", line)?,
            threshold: list(fields, "threshold", line)?,
            decision_type: list::<i16>(fields, "decision_type", line)?
                .into_iter()
                .map(|d| d as u8)
                .collect(),
            left_child: list(fields, "left_child", line)?,
            right_child: list(fields, "right_child", line)?,
            leaf_value: list(fields, "leaf_value", line)?,
            cat_boundaries: if num_cat > 0 { list(fields, "cat_boundaries", line)? } else { Vec::new() },
            cat_threshold: if num_cat > 0 { list(fields, "cat_threshold", line)? } else { Vec::new() },
        };

        tree.check_shape(num_leaves, num_cat, line)?;
        Ok(tree)
    }

    fn check_shape(&self, num_leaves: usize, num_cat: usize, line: usize) -> Result<(), ModelError> {
        let malformed = |message: String| ModelError::Malformed { line, message };

        if num_leaves == 0 || self.leaf_value.len() != num_leaves {
            return Err(malformed(format!(
                "expected {} leaf values, found {}",
                num_leaves,
                self.leaf_value.len()
            )));
        }

        let internal = num_leaves - 1;
        for (name, len) in [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ] {
            if len != internal {
                return Err(malformed(format!("{} has {} entries, expected {}", name, len, internal)));
            }
        }

        for node in 0..internal {
            for child in [self.left_child[node], self.right_child[node]] {
                let in_range = if child < 0 {
                    ((!child) as usize) < num_leaves
                } else {
                    // Internal children must point forward
                    (child as usize) > node && (child as usize) < internal
                };
                if !in_range {
                    return Err(malformed(format!("child index {} out of range", child)));
                }
            }
        }

        if num_cat > 0 && self.cat_boundaries.len() != num_cat + 1 {
            return Err(malformed("cat_boundaries does not match num_cat".to_string()));
        }
        for (node, &dt) in self.decision_type.iter().enumerate() {
            if dt & CATEGORICAL_MASK != 0 {
                let cat_idx = self.threshold[node] as usize;
                if cat_idx + 1 >= self.cat_boundaries.len()
                    || self.cat_boundaries[cat_idx] > self.cat_boundaries[cat_idx + 1]
                    || self.cat_boundaries[cat_idx + 1] > self.cat_threshold.len()
                {
                    return Err(malformed(format!("categorical split {} has no bitset", node)));
                }
            }
        }
        Ok(())
    }

    fn max_feature(&self) -> Option<usize> {
        self.split_feature.iter().copied().max()
    }

    fn predict(&self, x: &[f64]) -> f64 {
        if self.split_feature.is_empty() {
            return self.leaf_value[0];
        }

        let mut node: i32 = 0;
        // Children always point forward or at a leaf, so this terminates
        while node >= 0 {
            node = self.decide(x, node as usize);
        }
        self.leaf_value[(!node) as usize]
    }

    fn decide(&self, x: &[f64], node: usize) -> i32 {
        let fval = x.get(self.split_feature[node]).copied().unwrap_or(f64::NAN);
        let decision = self.decision_type[node];

        if decision & CATEGORICAL_MASK != 0 {
            self.categorical_decision(fval, node)
        } else {
            self.numerical_decision(fval, node)
        }
    }

    fn numerical_decision(&self, mut fval: f64, node: usize) -> i32 {
        let decision = self.decision_type[node];
        let missing_type = (decision >> 2) & 3;

        if fval.is_nan() && missing_type != 2 {
            fval = 0.0;
        }

        let is_missing = (missing_type == 1 && fval.abs() <= ZERO_THRESHOLD)
            || (missing_type == 2 && fval.is_nan());

        let go_left = if is_missing {
            decision & DEFAULT_LEFT_MASK != 0
        } else {
            fval <= self.threshold[node]
        };

        if go_left { self.left_child[node] } else { self.right_child[node] }
    }

    fn categorical_decision(&self, fval: f64, node: usize) -> i32 {
        if fval.is_nan() || fval < 0.0 {
            return self.right_child[node];
        }
        let category = fval as usize;
        let cat_idx = self.threshold[node] as usize;
        let bits = &self.cat_threshold[self.cat_boundaries[cat_idx]..self.cat_boundaries[cat_idx + 1]];

        let word = category / 32;
        let hit = word < bits.len() && (bits[word] >> (category % 32)) & 1 == 1;

        if hit { self.left_child[node] } else { self.right_child[node] }
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// Trained binary boosted-tree ensemble
#[derive(Debug, Clone)]
pub struct BoostedTreeModel {
    objective: Objective,
    trees: Vec<Tree>,
    average_output: bool,
    feature_names: Vec<String>,
}

impl BoostedTreeModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        tracing::info!("Loading boosted-tree model from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let model = Self::parse(&content)?;

        tracing::info!("Boosted-tree model loaded ({} trees)", model.trees.len());
        Ok(model)
    }

    pub fn parse(content: &str) -> Result<Self, ModelError> {
        let mut header: HashMap<String, String> = HashMap::new();
        let mut average_output = false;
        let mut trees = Vec::new();

        let mut current: Option<(usize, HashMap<String, String>)> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();

            if line == "end of trees" {
                break;
            }

            if line.starts_with("Tree=") {
                if let Some((start, fields)) = current.take() {
                    trees.push(Tree::from_fields(&fields, start)?);
                }
                current = Some((line_no, HashMap::new()));
                continue;
            }

            if line.is_empty() {
                continue;
            }

            match (&mut current, line.split_once('=')) {
                (Some((_, fields)), Some((key, value))) => {
                    fields.insert(key.to_string(), value.to_string());
                }
                (None, Some((key, value))) => {
                    header.insert(key.to_string(), value.to_string());
                }
                (None, None) if line == "average_output" => average_output = true,
                _ => {}
            }
        }
        if let Some((start, fields)) = current.take() {
            trees.push(Tree::from_fields(&fields, start)?);
        }

        let objective = header
            .get("objective")
            .ok_or_else(|| ModelError::Unsupported("model declares no objective".to_string()))
            .and_then(|value| Objective::parse(value, 0))?;

        let num_class: usize = field(&header, "num_class", 0)?.unwrap_or(1);
        let per_iteration: usize = field(&header, "num_tree_per_iteration", 0)?.unwrap_or(1);
        if num_class != 1 || per_iteration != 1 {
            return Err(ModelError::Unsupported(format!("{} classes", num_class)));
        }

        if trees.is_empty() {
            return Err(ModelError::Unsupported("model contains no trees".to_string()));
        }

        let feature_names = header
            .get("feature_names")
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            objective,
            trees,
            average_output,
            feature_names,
        })
    }

    /// Fail if any split reads past `schema_len` features
    pub fn check_feature_count(&self, schema_len: usize) -> Result<(), ModelError> {
        match self.trees.iter().filter_map(Tree::max_feature).max() {
            Some(index) if index >= schema_len => {
                Err(ModelError::FeatureOutOfRange { index, schema_len })
            }
            _ => Ok(()),
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Sum of tree outputs before the sigmoid
    pub fn raw_score(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        if self.average_output {
            sum / self.trees.len() as f64
        } else {
            sum
        }
    }

    /// Class-1 probability in [0, 1]
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        self.objective.probability(self.raw_score(x))
    }
}

// ============================================================================
// FIELD PARSING
// ============================================================================

fn field<T: FromStr>(
    fields: &HashMap<String, String>,
    key: &str,
    line: usize,
) -> Result<Option<T>, ModelError> {
    fields
        .get(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ModelError::Malformed {
                line,
                message: format!("bad value for `{}`", key),
            })
        })
        .transpose()
}

fn list<T: FromStr>(
    fields: &HashMap<String, String>,
    key: &str,
    line: usize,
) -> Result<Vec<T>, ModelError> {
    let Some(value) = fields.get(key) else {
        return Ok(Vec::new());
    };
    value
        .split_whitespace()
        .map(|item| {
            item.parse().map_err(|_| ModelError::Malformed {
                line,
                message: format!("bad entry `{}` in `{}`", item, key),
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "tree
version=v4
num_class=1
num_tree_per_iteration=1
label_index=0
max_feature_idx=2
objective=binary sigmoid:1
feature_names=a b c
feature_infos=[0:10] [0:10] [0:10]
tree_sizes=300 120

Tree=0
num_leaves=3
num_cat=0
split_feature=0 1
split_gain=10 5
threshold=0.5 2.0000000000000004
decision_type=2 10
left_child=-1 -2
right_child=1 -3
leaf_value=-1.5 0.4 2.5
leaf_weight=10 5 5
leaf_count=10 5 5
internal_value=0 0
internal_weight=0 0
internal_count=20 10
is_linear=0
shrinkage=1


Tree=1
num_leaves=1
num_cat=0
split_feature=
split_gain=
threshold=
decision_type=
left_child=
right_child=
leaf_value=0.1
leaf_weight=
leaf_count=
internal_value=
internal_weight=
internal_count=
is_linear=0
shrinkage=1


end of trees

feature_importances:
a=1
b=1

parameters:
[boosting: gbdt]
[objective: binary]
end of parameters

pandas_categorical:null
";

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_parse_header_and_trees() {
        let model = BoostedTreeModel::parse(MODEL).unwrap();

        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.objective(), Objective::Binary { sigmoid: 1.0 });
        assert_eq!(model.feature_names(), &["a", "b", "c"]);
    }

    #[test]
    fn test_predict_walks_splits() {
        let model = BoostedTreeModel::parse(MODEL).unwrap();

        // a <= 0.5 -> leaf 0
        assert!((model.raw_score(&[0.0, 9.0, 0.0]) - (-1.4)).abs() < 1e-12);
        // a > 0.5, b <= 2 -> leaf 1
        assert!((model.raw_score(&[1.0, 1.0, 0.0]) - 0.5).abs() < 1e-12);
        // a > 0.5, b > 2 -> leaf 2
        assert!((model.raw_score(&[1.0, 5.0, 0.0]) - 2.6).abs() < 1e-12);

        let p = model.predict_proba(&[1.0, 5.0, 0.0]);
        assert!((p - sigmoid(2.6)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_values() {
        let model = BoostedTreeModel::parse(MODEL).unwrap();

        // Node 0 has missing type None: NaN is read as 0.0 and goes left
        assert!((model.raw_score(&[f64::NAN, 5.0, 0.0]) - (-1.4)).abs() < 1e-12);
        // Node 1 has missing type NaN with default-left: NaN goes left
        assert!((model.raw_score(&[1.0, f64::NAN, 0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_parameter_applied() {
        let content = MODEL.replace("objective=binary sigmoid:1", "objective=binary sigmoid:2");
        let model = BoostedTreeModel::parse(&content).unwrap();

        let p = model.predict_proba(&[1.0, 1.0, 0.0]);
        assert!((p - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_average_output() {
        let content = MODEL.replace("tree_sizes=300 120", "tree_sizes=300 120\naverage_output");
        let model = BoostedTreeModel::parse(&content).unwrap();

        assert!((model.raw_score(&[1.0, 5.0, 0.0]) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_split() {
        let content = "objective=binary sigmoid:1

Tree=0
num_leaves=2
num_cat=1
split_feature=0
threshold=0
decision_type=1
left_child=-1
right_child=-2
leaf_value=1 -1
cat_boundaries=0 1
cat_threshold=10
is_linear=0

end of trees
";
        let model = BoostedTreeModel::parse(content).unwrap();

        // bitset 0b1010: categories 1 and 3 go left
        assert_eq!(model.raw_score(&[1.0]), 1.0);
        assert_eq!(model.raw_score(&[3.0]), 1.0);
        assert_eq!(model.raw_score(&[2.0]), -1.0);
        assert_eq!(model.raw_score(&[40.0]), -1.0);
        assert_eq!(model.raw_score(&[-1.0]), -1.0);
        assert_eq!(model.raw_score(&[f64::NAN]), -1.0);
    }

    #[test]
    fn test_feature_range_check() {
        let model = BoostedTreeModel::parse(MODEL).unwrap();

        assert!(model.check_feature_count(3).is_ok());
        assert!(matches!(
            model.check_feature_count(1),
            Err(ModelError::FeatureOutOfRange { index: 1, schema_len: 1 })
        ));
    }

    #[test]
    fn test_rejects_unsupported_objective() {
        let content = MODEL.replace("objective=binary sigmoid:1", "objective=regression");
        assert!(matches!(BoostedTreeModel::parse(&content), Err(ModelError::Unsupported(_))));
    }

    #[test]
    fn test_rejects_multiclass() {
        let content = MODEL.replace("num_class=1", "num_class=3");
        assert!(matches!(BoostedTreeModel::parse(&content), Err(ModelError::Unsupported(_))));
    }

    #[test]
    fn test_rejects_bad_child_index() {
        let content = MODEL.replace("right_child=1 -3", "right_child=1 -9");
        assert!(matches!(BoostedTreeModel::parse(&content), Err(ModelError::Malformed { .. })));
    }

    #[test]
    fn test_rejects_backward_child_index() {
        let content = MODEL.replace("right_child=1 -3", "right_child=1 0");
        assert!(matches!(BoostedTreeModel::parse(&content), Err(ModelError::Malformed { .. })));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(BoostedTreeModel::parse("not a model").is_err());
    }
}
