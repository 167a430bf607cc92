//! Harbor Threat Sentinel (HTS)
//!
//! This crate turns raw object-detection output from an external vision
//! model into structured maritime threat assessments.
//!
//! # Architecture
//!
//! - `assess`: the core - the classification table, per-detection metrics,
//!   and the aggregate score where the single most dangerous detection
//!   dominates.
//! - `transport`: parsing for the model's detection payload.
//! - `config`: sentineld configuration (JSON file + environment overrides).
//! - `api`: local loopback API consumed by the serving layer.
//!
//! The assessor is a pure transformation per call. Its only mutable state is
//! the configured confidence threshold, a single atomic scalar snapshotted
//! once at the start of each assessment so a concurrent update can never
//! produce an internally inconsistent result.

pub mod api;
pub mod assess;
pub mod config;
pub mod transport;

pub use assess::{
    validate_class_name, Assessment, BoundingBox, ClassificationTable, RawDetection,
    ThreatAssessor, ThreatDetection, ThreatLevel, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use transport::{parse_model_payload, DetectionBatch};
