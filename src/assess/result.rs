use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::assess::level::ThreatLevel;

/// Axis-aligned bounding box in pixel coordinates, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(from = "BoundingBoxWire")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Accepts both the `[x1, y1, x2, y2]` array form and the object form the
/// serving layer round-trips (extra width/height fields are ignored).
#[derive(Deserialize)]
#[serde(untagged)]
enum BoundingBoxWire {
    Corners([f64; 4]),
    Fields { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl From<BoundingBoxWire> for BoundingBox {
    fn from(wire: BoundingBoxWire) -> Self {
        match wire {
            BoundingBoxWire::Corners([x1, y1, x2, y2]) => BoundingBox { x1, y1, x2, y2 },
            BoundingBoxWire::Fields { x1, y1, x2, y2 } => BoundingBox { x1, y1, x2, y2 },
        }
    }
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Finite coordinates with x1 <= x2 and y1 <= y2.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 <= self.x2
            && self.y1 <= self.y2
    }

    /// Clamp to image bounds. A box fully outside collapses to zero area.
    pub fn clamped_to(&self, image_width: u32, image_height: u32) -> BoundingBox {
        let w = image_width as f64;
        let h = image_height as f64;
        BoundingBox {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

// Serialized with derived width/height alongside the corners; the consuming
// layer reads both forms.
impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BoundingBox", 6)?;
        state.serialize_field("x1", &self.x1)?;
        state.serialize_field("y1", &self.y1)?;
        state.serialize_field("x2", &self.x2)?;
        state.serialize_field("y2", &self.y2)?;
        state.serialize_field("width", &self.width())?;
        state.serialize_field("height", &self.height())?;
        state.end()
    }
}

/// One object reported by the external vision model.
#[derive(Clone, Debug, Deserialize)]
pub struct RawDetection {
    /// Model label for the detected object category.
    #[serde(alias = "class")]
    pub class_name: String,
    /// Detection confidence (0.0-1.0).
    #[serde(alias = "score")]
    pub confidence: f64,
    /// Box in pixel coordinates.
    #[serde(alias = "bbox")]
    pub bounding_box: BoundingBox,
}

/// A surviving detection with its classification and image-relative metrics.
#[derive(Clone, Debug, Serialize)]
pub struct ThreatDetection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    /// Confidence as a percentage, one decimal.
    pub confidence_percentage: f64,
    pub bounding_box: BoundingBox,
    /// Box area as a percentage of the image area, one decimal.
    pub relative_size: f64,
    pub threat_level: ThreatLevel,
}

/// Structured result of assessing one image's detections.
#[derive(Clone, Debug, Serialize)]
pub struct Assessment {
    pub success: bool,
    pub threat_count: usize,
    pub overall_threat_level: ThreatLevel,
    pub overall_threat_score: f64,
    pub threats: Vec<ThreatDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Assessment {
    /// Failure record for unusable call-level input. The assessor reports
    /// failures through this record; nothing panics across the boundary.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            threat_count: 0,
            overall_threat_level: ThreatLevel::None,
            overall_threat_score: 0.0,
            threats: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_accepts_array_and_object_forms() {
        let from_array: BoundingBox = serde_json::from_str("[1.0, 2.0, 11.0, 22.0]").unwrap();
        let from_object: BoundingBox =
            serde_json::from_str(r#"{"x1": 1.0, "y1": 2.0, "x2": 11.0, "y2": 22.0}"#).unwrap();
        assert_eq!(from_array, from_object);
        assert_eq!(from_array.width(), 10.0);
        assert_eq!(from_array.height(), 20.0);
        assert_eq!(from_array.area(), 200.0);
    }

    #[test]
    fn bounding_box_serializes_with_derived_extent() {
        let bbox = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        let value = serde_json::to_value(bbox).unwrap();
        assert_eq!(value["x1"], 10.0);
        assert_eq!(value["y2"], 70.0);
        assert_eq!(value["width"], 100.0);
        assert_eq!(value["height"], 50.0);
    }

    #[test]
    fn clamping_collapses_outside_boxes() {
        let inside = BoundingBox::new(-10.0, -10.0, 50.0, 50.0).clamped_to(100, 100);
        assert_eq!(inside, BoundingBox::new(0.0, 0.0, 50.0, 50.0));

        let outside = BoundingBox::new(200.0, 200.0, 300.0, 300.0).clamped_to(100, 100);
        assert_eq!(outside.area(), 0.0);
    }

    #[test]
    fn well_formedness_rejects_inverted_and_nan_boxes() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(2.0, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_well_formed());
    }

    #[test]
    fn failure_record_is_well_formed() {
        let failure = Assessment::failure("image dimensions must be positive");
        assert!(!failure.success);
        assert_eq!(failure.threat_count, 0);
        assert_eq!(failure.overall_threat_level, ThreatLevel::None);
        assert_eq!(failure.overall_threat_score, 0.0);
        assert!(failure.threats.is_empty());
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["error"], "image dimensions must be positive");
    }
}
