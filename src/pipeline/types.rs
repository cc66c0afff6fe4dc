use crate::capture::frame::Frame;
use uuid::Uuid;

/// Opaque token for one in-flight pipeline run. At most one live handle
/// exists at a time; `PipelineCoordinator::poll` matches outcomes to it
/// by id and discards anything left over from an abandoned run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub(crate) id: Uuid,
}

/// Axis-aligned region proposed by the board detector, with the fraction
/// of above-threshold pixels inside it as a confidence score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

/// Output of the board-detection stage: the source frame plus zero or
/// more candidate board regions. The frame rides along so the segmenter
/// can crop it without the stages sharing any buffer.
#[derive(Debug, Clone)]
pub struct BoardDetection {
    pub frame: Frame,
    pub regions: Vec<Region>,
}

/// Binary pin mask over the chosen board region, row-major, 0 or 255.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    pub width: u32,
    pub height: u32,
    pub mask: Vec<u8>,
}

/// Terminal pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinCount(pub u32);
