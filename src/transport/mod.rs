//! Transport layer for external model output.
//!
//! This module parses the detection payload produced by the external vision
//! model into the typed inputs the assessor consumes.

pub mod model;

pub use model::{parse_model_payload, DetectionBatch, ModelPayload};
