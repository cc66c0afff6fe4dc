use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use uuid::Uuid;

/// One captured camera frame. The pixel buffer is immutable and shared
/// behind an `Arc`, so handing a frame to the pipeline while the capture
/// loop keeps a copy for display never duplicates the image data.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    seq: u64,
    frame_id: Uuid,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(seq: u64, image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            seq,
            frame_id: Uuid::new_v4(),
            captured_at: Utc::now(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Grayscale view used by the stillness comparator.
    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }
}
