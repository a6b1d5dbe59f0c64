//! Flow scoring handler

use axum::{extract::{rejection::JsonRejection, State}, Json};
use serde::Serialize;
use serde_json::Value;

use crate::logic::model::{Decision, Label};
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub label: Label,
    pub confidence: f64,
    pub rule: String,
    pub latency_ms: f64,
}

impl From<&Decision> for ScoreResponse {
    fn from(decision: &Decision) -> Self {
        Self {
            label: decision.label,
            confidence: round_to(decision.confidence, 3),
            rule: decision.rule.clone(),
            latency_ms: round_to(decision.latency_ms, 2),
        }
    }
}

/// Score one flow
pub async fn score(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<ScoreResponse>> {
    let Json(body) = body?;

    let (record, decision) = state.service.score(&body)?;
    let response = ScoreResponse::from(&decision);

    // Logging is best-effort: the handle is dropped and the response does
    // not wait for the append.
    drop(state.service.dispatch_log(record, decision));

    Ok(Json(response))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
