//! Loaded model status

use axum::{extract::State, Json};

use crate::logic::service::ModelInfo;
use crate::AppState;

pub async fn info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.service.model_info())
}
