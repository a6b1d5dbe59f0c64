//! Normalizer - persisted standard-scaler parameters
//!
//! Degraded mode: when the parameters are missing or do not match the schema,
//! `apply` hands back the raw vector and warns instead of refusing service.

use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureSchema;

/// Normalization parameters from training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParameters {
    #[serde(alias = "mean_")]
    pub mean: Vec<f64>,
    #[serde(alias = "scale_")]
    pub scale: Vec<f64>,
    #[serde(default, alias = "n_features_in_")]
    pub n_features: Option<usize>,
}

impl ScalerParameters {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Shape problem against a schema of `expected` features, if any
    fn mismatch(&self, expected: usize) -> Option<String> {
        if self.mean.len() != self.scale.len() {
            return Some(format!(
                "mean has {} entries, scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.len() != expected {
            return Some(format!(
                "scaler has {} entries, schema has {} features",
                self.mean.len(),
                expected
            ));
        }
        match self.n_features {
            Some(n) if n != expected => Some(format!(
                "scaler declares {} features, schema has {}",
                n, expected
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Active {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Applies `(x - mean) / scale` element-wise
#[derive(Debug, Clone)]
pub struct Normalizer {
    params: Option<Active>,
    reason: String,
}

impl Normalizer {
    /// Load parameters for `schema`. Never fails: problems leave the
    /// normalizer inactive.
    pub fn load(path: impl AsRef<Path>, schema: &FeatureSchema) -> Self {
        let path = path.as_ref();
        match ScalerParameters::from_file(path) {
            Ok(params) => {
                let normalizer = Self::new(params, schema.len());
                if normalizer.is_active() {
                    tracing::info!("Loaded scaler parameters from {}", path.display());
                }
                normalizer
            }
            Err(e) => {
                tracing::warn!("Could not load scaler parameters from {}: {}", path.display(), e);
                Self::inactive(format!("scaler parameters unavailable: {}", e))
            }
        }
    }

    /// Build from parameters already in memory, checked against `expected` features
    pub fn new(params: ScalerParameters, expected: usize) -> Self {
        if let Some(reason) = params.mismatch(expected) {
            tracing::warn!("Scaler mismatch, normalization disabled: {}", reason);
            return Self::inactive(reason);
        }

        let mut guarded = 0;
        let scale: Vec<f64> = params
            .scale
            .iter()
            .map(|&s| {
                if s == 0.0 || !s.is_finite() {
                    guarded += 1;
                    1.0
                } else {
                    s
                }
            })
            .collect();
        if guarded > 0 {
            tracing::warn!("{} scale entries were zero or non-finite, using 1.0", guarded);
        }

        Self {
            params: Some(Active {
                mean: Array1::from_vec(params.mean),
                scale: Array1::from_vec(scale),
            }),
            reason: String::new(),
        }
    }

    pub fn inactive(reason: impl Into<String>) -> Self {
        Self {
            params: None,
            reason: reason.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.params.is_some()
    }

    /// Scale a raw vector; returns it unchanged (with a warning) when the
    /// parameters cannot be applied.
    pub fn apply(&self, raw: &[f64]) -> Vec<f64> {
        let Some(params) = &self.params else {
            tracing::warn!("Normalization skipped: {}", self.reason);
            return raw.to_vec();
        };

        if raw.len() != params.mean.len() {
            tracing::warn!(
                "Feature mismatch: scaler expects {}, got {}",
                params.mean.len(),
                raw.len()
            );
            return raw.to_vec();
        }

        let x = Array1::from_vec(raw.to_vec());
        ((x - &params.mean) / &params.scale).to_vec()
    }
}
