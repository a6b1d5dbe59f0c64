//! Simple counters endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub total: u64,
    pub attack: u64,
    pub benign: u64,
}

pub async fn simple(State(state): State<AppState>) -> Json<MetricsResponse> {
    let snapshot = state.service.metrics();
    Json(MetricsResponse {
        total: snapshot.requests,
        attack: snapshot.label_attack,
        benign: snapshot.label_benign,
    })
}
