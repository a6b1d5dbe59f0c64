//! Configuration module

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Feature manifest, one name per line
    pub features_path: PathBuf,

    /// Boosted-tree model (LightGBM text format)
    pub model_path: PathBuf,

    /// Name embedded in the audit rule; defaults to the model file stem
    pub model_name: Option<String>,

    /// Scaler parameters JSON
    pub scaler_path: PathBuf,

    /// Two-feature fallback forest; unset means no fallback
    pub fallback_model_path: Option<PathBuf>,

    /// Append-only decision log
    pub decision_log_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            features_path: path_var("FEATURES_PATH", "models/features.txt"),

            model_path: path_var("MODEL_PATH", "models/lightgbm_demo.txt"),

            model_name: non_empty_var("MODEL_NAME"),

            scaler_path: path_var("SCALER_PATH", "models/scaler_params.json"),

            fallback_model_path: non_empty_var("FALLBACK_MODEL_PATH").map(PathBuf::from),

            decision_log_path: path_var("DECISION_LOG_PATH", "runs/decisions.csv"),
        }
    }
}

fn path_var(key: &str, default: &str) -> PathBuf {
    non_empty_var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
