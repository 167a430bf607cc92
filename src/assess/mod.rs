mod assessor;
mod level;
mod result;
mod table;

pub use assessor::{ThreatAssessor, DEFAULT_CONFIDENCE_THRESHOLD};
pub use level::ThreatLevel;
pub use result::{Assessment, BoundingBox, RawDetection, ThreatDetection};
pub use table::{validate_class_name, ClassificationTable};
