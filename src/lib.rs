//! 5G IDS Flow Scoring Service
//!
//! Scores single network flows as attack or benign.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     FLOW SCORING SERVICE                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /score                                                 │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────────┐ │
//! │  │ FlowRecord │──▶│ Normalizer │──▶│ Scorer               │ │
//! │  │ + Schema   │   │ (boosted)  │   │ boosted │ fallback   │ │
//! │  └────────────┘   └────────────┘   └──────────┬───────────┘ │
//! │                                               ▼              │
//! │                 ┌──────────┐          ┌──────────────┐      │
//! │                 │ Metrics  │◀─────────│   Decision   │      │
//! │                 └──────────┘          └──────┬───────┘      │
//! │                                              ▼ (detached)    │
//! │                                      ┌──────────────┐       │
//! │                                      │ Decision log │       │
//! │                                      └──────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};
use logic::service::ScoringService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScoringService>,
}

impl AppState {
    pub fn new(service: ScoringService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/metrics_simple", get(handlers::metrics::simple))
        .route("/model_info", get(handlers::model::info))
        .route("/score", post(handlers::score::score))
        .fallback(handlers::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
