//! Scoring Service - per-request pipeline
//!
//! `Received → Validated → (Normalized) → Scored → Logged → Responded`.
//! Validation and scoring failures reject the request before anything is
//! counted or logged. Logging runs detached after the decision is built and
//! cannot change the response.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::Config;
use super::decisions::DecisionLogger;
use super::features::{FeatureError, FeatureSchema, FlowRecord, RecordError};
use super::metrics::{MetricsAggregator, MetricsSnapshot};
use super::model::{select_scorer, Decision, Scorer, ScorerVariant, StartupError};

/// Per-request, client-caused failures
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error(transparent)]
    Validation(#[from] RecordError),

    #[error(transparent)]
    MissingFeature(#[from] FeatureError),
}

/// Loaded model view for operators
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub variant: ScorerVariant,
    pub rule: String,
    pub feature_count: usize,
    pub layout_hash: String,
    pub normalization_active: bool,
    pub num_trees: usize,
    pub avg_latency_ms: f64,
    pub decisions_logged: u64,
    pub log_failures: u64,
}

/// Shared state behind every request. Schema and scorer are read-only after
/// startup; metrics and the log serialize their own writes.
pub struct ScoringService {
    schema: Arc<FeatureSchema>,
    scorer: Arc<dyn Scorer>,
    logger: Arc<DecisionLogger>,
    metrics: MetricsAggregator,
}

impl ScoringService {
    /// Load every artifact. Any error here must abort startup.
    pub fn initialize(config: &Config) -> Result<Self, StartupError> {
        let schema = FeatureSchema::load(&config.features_path)?;
        let scorer = select_scorer(config, &schema)?;
        let logger = DecisionLogger::open(&config.decision_log_path, &schema);
        tracing::info!("Decision log: {}", logger.path().display());

        Ok(Self::new(schema, scorer, logger))
    }

    pub fn new(schema: FeatureSchema, scorer: Arc<dyn Scorer>, logger: DecisionLogger) -> Self {
        Self {
            schema: Arc::new(schema),
            scorer,
            logger: Arc::new(logger),
            metrics: MetricsAggregator::new(),
        }
    }

    pub fn logger(&self) -> &DecisionLogger {
        &self.logger
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate, score and count one flow
    pub fn score(&self, body: &Value) -> Result<(FlowRecord, Decision), ScoreError> {
        let started = Instant::now();

        let record = FlowRecord::parse(body, &self.schema)?;
        let features = self.schema.project(&record)?;
        let prediction = self.scorer.predict(&features);

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let decision = Decision::new(prediction, self.scorer.rule(), latency_ms);

        self.metrics.increment(decision.label, decision.latency_ms);

        tracing::info!(
            "Flow scored -> label={} conf={:.2} rule={} latency_ms={:.2}",
            decision.label,
            decision.confidence,
            decision.rule,
            decision.latency_ms
        );

        Ok((record, decision))
    }

    /// Append the decision on the blocking pool.
    ///
    /// Fire-and-forget: callers respond without awaiting the handle, and a
    /// failed append is only reported through tracing.
    pub fn dispatch_log(&self, record: FlowRecord, decision: Decision) -> JoinHandle<()> {
        let logger = Arc::clone(&self.logger);
        tokio::task::spawn_blocking(move || logger.log(&record, &decision))
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            variant: self.scorer.variant(),
            rule: self.scorer.rule().to_string(),
            feature_count: self.schema.len(),
            layout_hash: format!("{:08x}", self.schema.layout_hash()),
            normalization_active: self.scorer.normalizes(),
            num_trees: self.scorer.num_trees(),
            avg_latency_ms: self.metrics.snapshot().avg_latency_ms(),
            decisions_logged: self.logger.written(),
            log_failures: self.logger.failures(),
        }
    }
}
