//! Decisions Module - Audit log of scored flows
//!
//! Every scored flow becomes one CSV row: the schema features in manifest
//! order followed by the verdict columns. The file is append-only; the running
//! service never rewrites or deletes rows.

pub mod writer;


pub use writer::DecisionLogger;

/// Verdict columns appended after the feature columns
pub const METADATA_COLUMNS: &[&str] = &["label", "confidence", "rule", "latency_ms", "timestamp"];
