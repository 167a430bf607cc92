//! External vision-model payload parsing utilities.
//!
//! This module provides shared parsing logic for the detection payload the
//! vision model emits per image, used by both the assessment API and the
//! assess CLI.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::assess::RawDetection;

/// Payload emitted by the external vision model for one image.
///
/// Detections are held as raw JSON values so that one malformed entry can be
/// skipped without aborting the batch.
#[derive(Debug, Deserialize)]
pub struct ModelPayload {
    /// Source image width in pixels.
    pub image_width: u32,

    /// Source image height in pixels.
    pub image_height: u32,

    /// Optional per-request confidence threshold override.
    #[serde(default)]
    pub confidence_threshold: Option<f64>,

    /// Raw detections as emitted by the model.
    #[serde(default)]
    pub detections: Vec<serde_json::Value>,
}

/// Parsed model output ready for assessment.
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub image_width: u32,
    pub image_height: u32,
    pub confidence_threshold: Option<f64>,
    pub detections: Vec<RawDetection>,
}

/// Parse a model output payload.
///
/// Returns an error only when the payload as a whole is unusable (not JSON,
/// missing dimensions, `detections` not an array). Individual entries that
/// fail to parse are skipped with a debug log; the rest of the batch
/// survives.
pub fn parse_model_payload(payload: &[u8]) -> Result<DetectionBatch> {
    let wire: ModelPayload =
        serde_json::from_slice(payload).map_err(|e| anyhow!("parse error: {}", e))?;

    let mut detections = Vec::with_capacity(wire.detections.len());
    for entry in wire.detections {
        match serde_json::from_value::<RawDetection>(entry) {
            Ok(det) => detections.push(det),
            Err(e) => log::debug!("skipping malformed detection entry: {}", e),
        }
    }

    Ok(DetectionBatch {
        image_width: wire.image_width,
        image_height: wire.image_height,
        confidence_threshold: wire.confidence_threshold,
        detections,
    })
}
