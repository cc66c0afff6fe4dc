use crate::capture::frame::Frame;
use crate::stillness::metric;
use image::GrayImage;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillnessVerdict {
    Static,
    Moving,
}

/// Comparator policy. `AbsDiffSum` judges a frame static when the summed
/// per-pixel difference against the reference stays under the threshold;
/// `Ssim` when the similarity score exceeds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StillnessMetric {
    AbsDiffSum { threshold: u64 },
    Ssim { threshold: f64 },
}

/// When the reference frame is replaced. `OnMotionOnly` keeps comparing a
/// still plateau against the last frame that moved; `EveryFrame` compares
/// each frame against its immediate predecessor, so a slow drift that
/// never exceeds the threshold between neighbors stays static.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceUpdate {
    OnMotionOnly,
    EveryFrame,
}

/// Stateful comparator deciding whether the scene has settled. Holds at
/// most one grayscale reference frame; the very first observation only
/// seeds the reference and is always reported as moving.
pub struct StillnessDetector {
    metric: StillnessMetric,
    reference_update: ReferenceUpdate,
    reference: Option<GrayImage>,
}

impl StillnessDetector {
    pub fn new(metric: StillnessMetric, reference_update: ReferenceUpdate) -> Self {
        Self {
            metric,
            reference_update,
            reference: None,
        }
    }

    pub fn evaluate(&mut self, frame: &Frame) -> StillnessVerdict {
        let gray = frame.to_gray();
        let Some(reference) = self.reference.as_ref() else {
            self.reference = Some(gray);
            return StillnessVerdict::Moving;
        };

        // A resolution change is a scene change.
        if reference.dimensions() != gray.dimensions() {
            self.reference = Some(gray);
            return StillnessVerdict::Moving;
        }

        let verdict = match self.metric {
            StillnessMetric::AbsDiffSum { threshold } => {
                if metric::abs_diff_sum(reference, &gray) < threshold {
                    StillnessVerdict::Static
                } else {
                    StillnessVerdict::Moving
                }
            }
            StillnessMetric::Ssim { threshold } => {
                if metric::ssim(reference, &gray) > threshold {
                    StillnessVerdict::Static
                } else {
                    StillnessVerdict::Moving
                }
            }
        };

        match (self.reference_update, verdict) {
            (ReferenceUpdate::EveryFrame, _) | (ReferenceUpdate::OnMotionOnly, StillnessVerdict::Moving) => {
                self.reference = Some(gray);
            }
            (ReferenceUpdate::OnMotionOnly, StillnessVerdict::Static) => {}
        }
        verdict
    }
}
