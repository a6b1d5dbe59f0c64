//! HTTP handlers

pub mod health;
pub mod metrics;
pub mod model;
pub mod score;

use axum::http::Uri;

use crate::AppError;

/// Unknown routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
