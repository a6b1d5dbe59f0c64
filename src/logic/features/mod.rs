//! Features Module - Flow feature contract
//!
//! Schema manifest, request validation and projection into the ordered
//! vector consumed by the scorers.

pub mod record;
pub mod schema;
pub mod vector;

pub use record::{FlowRecord, RecordError, METADATA_FIELDS};
pub use schema::{FeatureError, FeatureSchema, SchemaError};
pub use vector::FeatureVector;
