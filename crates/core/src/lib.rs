//! Core types, validation, and collaborator traits for the insight sink.

pub mod envelope;
pub mod error;
pub mod limits;
pub mod model;
pub mod schema;
pub mod sink;
pub mod store;

pub use envelope::*;
pub use error::{Error, Result, ValidationErrorCode};
pub use model::InsightModel;
pub use sink::MeasurementSink;
pub use store::*;
