//! Scorer - feature vector to verdict
//!
//! Two variants behind one trait, chosen once at startup:
//! - `GradientBoostedScorer`: normalized full-schema input, boosted trees
//! - `StatisticalFallbackScorer`: packet/byte counters, fallback forest

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::logic::features::{FeatureSchema, FeatureVector};
use super::forest::{FallbackForest, ForestError};
use super::gbdt::{BoostedTreeModel, ModelError};
use super::scaler::Normalizer;

/// Probability above which a flow is labelled attack
pub const ATTACK_THRESHOLD: f64 = 0.5;

/// Counters summed into the fallback's packet count
pub const PACKET_FEATURES: [&str; 2] = ["total_pkts_fwd", "total_pkts_bwd"];
/// Counters summed into the fallback's byte count
pub const BYTE_FEATURES: [&str; 2] = ["total_bytes_fwd", "total_bytes_bwd"];

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Attack,
    Benign,
}

impl Label {
    pub fn from_probability(probability: f64) -> Self {
        if probability > ATTACK_THRESHOLD {
            Label::Attack
        } else {
            Label::Benign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Attack => "attack",
            Label::Benign => "benign",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label and unrounded class-1 probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        let confidence = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
        Self {
            label: Label::from_probability(confidence),
            confidence,
        }
    }
}

/// Verdict for one scored request, read-only once built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub label: Label,
    pub confidence: f64,
    pub rule: String,
    pub latency_ms: f64,
}

impl Decision {
    pub fn new(prediction: Prediction, rule: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            label: prediction.label,
            confidence: prediction.confidence,
            rule: rule.into(),
            latency_ms: latency_ms.max(0.0),
        }
    }
}

// ============================================================================
// SCORER TRAIT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerVariant {
    GradientBoosted,
    StatisticalFallback,
}

pub trait Scorer: Send + Sync {
    fn variant(&self) -> ScorerVariant;

    /// Audit identifier written with every decision
    fn rule(&self) -> &str;

    /// Whether normalization is applied before inference
    fn normalizes(&self) -> bool {
        false
    }

    fn num_trees(&self) -> usize;

    fn predict(&self, features: &FeatureVector) -> Prediction;
}

// ============================================================================
// GRADIENT BOOSTED
// ============================================================================

pub struct GradientBoostedScorer {
    model: BoostedTreeModel,
    normalizer: Normalizer,
    rule: String,
}

impl GradientBoostedScorer {
    pub fn new(
        model: BoostedTreeModel,
        normalizer: Normalizer,
        schema: &FeatureSchema,
        model_name: &str,
    ) -> Result<Self, ModelError> {
        model.check_feature_count(schema.len())?;

        let names = model.feature_names();
        if !names.is_empty() && names != schema.names() {
            tracing::warn!("Model feature names differ from the schema manifest; scoring in manifest order");
        }

        Ok(Self {
            model,
            normalizer,
            rule: format!("ml:{}", model_name),
        })
    }
}

impl Scorer for GradientBoostedScorer {
    fn variant(&self) -> ScorerVariant {
        ScorerVariant::GradientBoosted
    }

    fn rule(&self) -> &str {
        &self.rule
    }

    fn normalizes(&self) -> bool {
        self.normalizer.is_active()
    }

    fn num_trees(&self) -> usize {
        self.model.num_trees()
    }

    fn predict(&self, features: &FeatureVector) -> Prediction {
        let scaled = self.normalizer.apply(features.as_slice());
        Prediction::from_probability(self.model.predict_proba(&scaled))
    }
}

// ============================================================================
// STATISTICAL FALLBACK
// ============================================================================

pub struct StatisticalFallbackScorer {
    forest: FallbackForest,
    packet_idx: [usize; 2],
    byte_idx: [usize; 2],
    rule: String,
}

impl StatisticalFallbackScorer {
    pub fn new(forest: FallbackForest, schema: &FeatureSchema) -> Result<Self, ForestError> {
        let index = |name: &str| {
            schema.index_of(name).ok_or_else(|| {
                ForestError::Invalid(format!("schema lacks counter feature `{}`", name))
            })
        };

        let packet_idx = [index(PACKET_FEATURES[0])?, index(PACKET_FEATURES[1])?];
        let byte_idx = [index(BYTE_FEATURES[0])?, index(BYTE_FEATURES[1])?];
        let rule = format!("fallback:{}", forest.name);

        Ok(Self {
            forest,
            packet_idx,
            byte_idx,
            rule,
        })
    }

    fn sum(features: &FeatureVector, idx: &[usize; 2]) -> f64 {
        idx.iter().filter_map(|&i| features.get(i)).sum()
    }
}

impl Scorer for StatisticalFallbackScorer {
    fn variant(&self) -> ScorerVariant {
        ScorerVariant::StatisticalFallback
    }

    fn rule(&self) -> &str {
        &self.rule
    }

    fn num_trees(&self) -> usize {
        self.forest.num_trees()
    }

    fn predict(&self, features: &FeatureVector) -> Prediction {
        let packets = Self::sum(features, &self.packet_idx);
        let bytes = Self::sum(features, &self.byte_idx);
        Prediction::from_probability(self.forest.predict_proba(packets, bytes))
    }
}

// ============================================================================
// STARTUP SELECTION
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(#[from] crate::logic::features::SchemaError),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Pick the scorer variant once, based on which artifacts load
pub fn select_scorer(
    config: &Config,
    schema: &FeatureSchema,
) -> Result<Arc<dyn Scorer>, StartupError> {
    let primary = load_primary(config, schema);

    let primary_err = match primary {
        Ok(scorer) => {
            tracing::info!("Primary model ready, rule {}", scorer.rule());
            return Ok(Arc::new(scorer));
        }
        Err(e) => e,
    };

    let Some(fallback_path) = config.fallback_model_path.as_deref() else {
        return Err(StartupError::ModelUnavailable(format!(
            "{} (no fallback configured)",
            primary_err
        )));
    };

    tracing::warn!("Primary model unavailable ({}), switching to fallback", primary_err);

    let scorer = FallbackForest::load(fallback_path)
        .and_then(|forest| StatisticalFallbackScorer::new(forest, schema))
        .map_err(|e| {
            StartupError::ModelUnavailable(format!("{}; fallback failed: {}", primary_err, e))
        })?;

    tracing::warn!("Serving with degraded scorer, rule {}", scorer.rule());
    Ok(Arc::new(scorer))
}

fn load_primary(config: &Config, schema: &FeatureSchema) -> Result<GradientBoostedScorer, ModelError> {
    let model = BoostedTreeModel::load(&config.model_path)?;
    let normalizer = Normalizer::load(&config.scaler_path, schema);
    let name = config
        .model_name
        .clone()
        .unwrap_or_else(|| model_stem(&config.model_path));

    GradientBoostedScorer::new(model, normalizer, schema, &name)
}

fn model_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string()
}
