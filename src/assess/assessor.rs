use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};

use crate::assess::level::ThreatLevel;
use crate::assess::result::{Assessment, RawDetection, ThreatDetection};
use crate::assess::table::ClassificationTable;

/// Default minimum confidence for a detection to be reported.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.2;

fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(anyhow!(
            "confidence threshold must be within [0.0, 1.0], got {}",
            threshold
        ));
    }
    Ok(())
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Converts raw vision-model detections into a threat assessment.
///
/// The assessor is immutable apart from the stored confidence threshold, a
/// single atomic scalar. Each `assess` call snapshots the threshold exactly
/// once, so a concurrent update never changes the cutoff mid-assessment.
pub struct ThreatAssessor {
    table: ClassificationTable,
    /// f64 bits; written only by `set_confidence_threshold`.
    confidence_threshold: AtomicU64,
}

impl ThreatAssessor {
    pub fn new(table: ClassificationTable) -> Self {
        Self {
            table,
            confidence_threshold: AtomicU64::new(DEFAULT_CONFIDENCE_THRESHOLD.to_bits()),
        }
    }

    pub fn with_confidence_threshold(table: ClassificationTable, threshold: f64) -> Result<Self> {
        let assessor = Self::new(table);
        assessor.set_confidence_threshold(threshold)?;
        Ok(assessor)
    }

    pub fn confidence_threshold(&self) -> f64 {
        f64::from_bits(self.confidence_threshold.load(Ordering::SeqCst))
    }

    /// Update the stored threshold. Rejects values outside [0.0, 1.0].
    pub fn set_confidence_threshold(&self, threshold: f64) -> Result<()> {
        validate_threshold(threshold)?;
        self.confidence_threshold
            .store(threshold.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    /// Recognized classes, for health/introspection endpoints.
    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    /// Assess one image's raw detections.
    ///
    /// `threshold_override` applies to this call only and never touches the
    /// stored configuration. Malformed individual detections are skipped,
    /// never an error; the only failure records are call-level (zero image
    /// dimension, out-of-range override).
    pub fn assess(
        &self,
        raw_detections: &[RawDetection],
        image_width: u32,
        image_height: u32,
        threshold_override: Option<f64>,
    ) -> Assessment {
        if image_width == 0 || image_height == 0 {
            return Assessment::failure(format!(
                "image dimensions must be positive (got {}x{})",
                image_width, image_height
            ));
        }

        let threshold = match threshold_override {
            Some(value) => {
                if let Err(err) = validate_threshold(value) {
                    return Assessment::failure(err.to_string());
                }
                value
            }
            None => self.confidence_threshold(),
        };

        let image_area = image_width as f64 * image_height as f64;
        let mut threats: Vec<ThreatDetection> = Vec::with_capacity(raw_detections.len());
        for det in raw_detections {
            if !det.confidence.is_finite() || !(0.0..=1.0).contains(&det.confidence) {
                log::debug!(
                    "skipping detection '{}': confidence {} out of bounds",
                    det.class_name,
                    det.confidence
                );
                continue;
            }
            if !det.bounding_box.is_well_formed() {
                log::debug!(
                    "skipping detection '{}': malformed bounding box {:?}",
                    det.class_name,
                    det.bounding_box
                );
                continue;
            }
            if det.confidence < threshold {
                continue;
            }
            let bounding_box = det.bounding_box.clamped_to(image_width, image_height);
            let area = bounding_box.area();
            if area <= 0.0 {
                log::debug!(
                    "skipping detection '{}': zero-area box after clamping",
                    det.class_name
                );
                continue;
            }
            let threat_level = match self.table.lookup(&det.class_name) {
                Some(level) => level,
                None => {
                    log::debug!(
                        "unrecognized class '{}', classifying as NONE",
                        det.class_name
                    );
                    ThreatLevel::None
                }
            };
            threats.push(ThreatDetection {
                class_name: det.class_name.clone(),
                confidence: det.confidence,
                confidence_percentage: round_one_decimal(det.confidence * 100.0),
                bounding_box,
                relative_size: round_one_decimal(100.0 * area / image_area),
                threat_level,
            });
        }

        // Descending confidence, ties by descending relative size; the
        // stable sort keeps original order for remaining ties.
        threats.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.relative_size.total_cmp(&a.relative_size))
        });

        // The single most dangerous detection dominates: the score is the
        // maximum confidence-weighted contribution, and the overall level is
        // the level of the detection that produced it. On an exact tie the
        // higher level wins.
        let mut top: Option<(f64, ThreatLevel)> = None;
        for threat in &threats {
            let contribution =
                (threat.confidence * threat.threat_level.weight()).clamp(0.0, 1.0);
            let replace = match top {
                None => true,
                Some((best, best_level)) => {
                    contribution > best
                        || (contribution == best && threat.threat_level > best_level)
                }
            };
            if replace {
                top = Some((contribution, threat.threat_level));
            }
        }
        let (overall_threat_score, overall_threat_level) =
            top.unwrap_or((0.0, ThreatLevel::None));

        Assessment {
            success: true,
            threat_count: threats.len(),
            overall_threat_level,
            overall_threat_score,
            threats,
            error: None,
        }
    }
}
