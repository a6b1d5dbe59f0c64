//! Logic Module - Flow scoring pipeline

pub mod decisions;
pub mod features;
pub mod metrics;
pub mod model;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;
