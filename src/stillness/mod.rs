pub mod detector;
pub mod metric;

pub use detector::{ReferenceUpdate, StillnessDetector, StillnessMetric, StillnessVerdict};
