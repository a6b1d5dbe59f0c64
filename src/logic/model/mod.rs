//! Model Module - Inference for flow scoring
//!
//! Artifact loading (boosted trees, fallback forest, scaler) and the scorer
//! variants built on top of them.

pub mod forest;
pub mod gbdt;
pub mod scaler;
pub mod scorer;

// Re-export common types
pub use forest::FallbackForest;
pub use gbdt::BoostedTreeModel;
pub use scaler::{Normalizer, ScalerParameters};
pub use scorer::{
    select_scorer, Decision, GradientBoostedScorer, Label, Prediction, Scorer, ScorerVariant,
    StartupError, StatisticalFallbackScorer,
};
