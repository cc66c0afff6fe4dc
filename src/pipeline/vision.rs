//! Built-in luminance-based models. Stand-ins for the real detection,
//! segmentation, and counting networks with the same stage contracts,
//! good enough to run the demo pipeline against synthetic scenes.

use crate::capture::frame::Frame;
use crate::error::InferenceError;
use crate::pipeline::model::Model;
use crate::pipeline::types::{BoardDetection, PinCount, Region, SegmentationMask};
use async_trait::async_trait;

/// Proposes the bounding box of everything brighter than the background.
pub struct ThresholdBoardDetector {
    board_luma: u8,
}

impl ThresholdBoardDetector {
    pub fn new(board_luma: u8) -> Self {
        Self { board_luma }
    }
}

#[async_trait]
impl Model<Frame, BoardDetection> for ThresholdBoardDetector {
    async fn infer(&mut self, input: Frame) -> Result<BoardDetection, InferenceError> {
        let gray = input.to_gray();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut bright = 0u64;
        for (x, y, pixel) in gray.enumerate_pixels() {
            if pixel.0[0] > self.board_luma {
                bright += 1;
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        let regions = match bounds {
            Some((x0, y0, x1, y1)) => {
                let width = x1 - x0 + 1;
                let height = y1 - y0 + 1;
                vec![Region {
                    x: x0,
                    y: y0,
                    width,
                    height,
                    confidence: bright as f32 / (width * height) as f32,
                }]
            }
            None => Vec::new(),
        };
        Ok(BoardDetection {
            frame: input,
            regions,
        })
    }

    fn name(&self) -> &'static str {
        "threshold-board-detector"
    }
}

/// Masks the pixels bright enough to be pin pads inside the most
/// confident board region.
pub struct LumaSegmenter {
    pin_luma: u8,
}

impl LumaSegmenter {
    pub fn new(pin_luma: u8) -> Self {
        Self { pin_luma }
    }
}

#[async_trait]
impl Model<BoardDetection, SegmentationMask> for LumaSegmenter {
    async fn infer(&mut self, input: BoardDetection) -> Result<SegmentationMask, InferenceError> {
        let region = input
            .regions
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .copied()
            .ok_or_else(|| InferenceError::BadInput("no board region detected".to_string()))?;
        let gray = input.frame.to_gray();
        let (image_width, image_height) = gray.dimensions();
        let x1 = (region.x + region.width).min(image_width);
        let y1 = (region.y + region.height).min(image_height);

        let mut mask = Vec::with_capacity(((x1 - region.x) * (y1 - region.y)) as usize);
        for y in region.y..y1 {
            for x in region.x..x1 {
                mask.push(if gray.get_pixel(x, y).0[0] > self.pin_luma {
                    255
                } else {
                    0
                });
            }
        }
        Ok(SegmentationMask {
            width: x1 - region.x,
            height: y1 - region.y,
            mask,
        })
    }

    fn name(&self) -> &'static str {
        "luma-segmenter"
    }
}

/// Counts 4-connected components of the pin mask, skipping specks below
/// `min_area` pixels.
pub struct ComponentPinCounter {
    min_area: usize,
}

impl ComponentPinCounter {
    pub fn new(min_area: usize) -> Self {
        Self { min_area }
    }
}

#[async_trait]
impl Model<SegmentationMask, PinCount> for ComponentPinCounter {
    async fn infer(&mut self, input: SegmentationMask) -> Result<PinCount, InferenceError> {
        let expected = (input.width * input.height) as usize;
        if input.mask.len() != expected {
            return Err(InferenceError::BadInput(format!(
                "mask length {} does not match {}x{}",
                input.mask.len(),
                input.width,
                input.height
            )));
        }
        Ok(PinCount(count_components(
            &input.mask,
            input.width as usize,
            input.height as usize,
            self.min_area,
        )))
    }

    fn name(&self) -> &'static str {
        "component-pin-counter"
    }
}

fn count_components(mask: &[u8], width: usize, height: usize, min_area: usize) -> u32 {
    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut count = 0u32;
    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut area = 0usize;
        while let Some(index) = stack.pop() {
            area += 1;
            let (x, y) = (index % width, index / width);
            let mut neighbors = [None; 4];
            if x > 0 {
                neighbors[0] = Some(index - 1);
            }
            if x + 1 < width {
                neighbors[1] = Some(index + 1);
            }
            if y > 0 {
                neighbors[2] = Some(index - width);
            }
            if y + 1 < height {
                neighbors[3] = Some(index + width);
            }
            for neighbor in neighbors.into_iter().flatten() {
                if mask[neighbor] != 0 && !visited[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }
        if area >= min_area {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::source::board_image;

    fn board_frame(pins: u32) -> Frame {
        Frame::new(0, board_image(320, 240, pins))
    }

    #[tokio::test]
    async fn detector_finds_the_board_region() {
        let mut detector = ThresholdBoardDetector::new(60);
        let detection = detector.infer(board_frame(4)).await.unwrap();
        assert_eq!(detection.regions.len(), 1);
        let region = detection.regions[0];
        // Board occupies the central three quarters of a 320x240 frame.
        assert_eq!((region.x, region.y), (40, 30));
        assert_eq!((region.width, region.height), (240, 180));
        assert!(region.confidence > 0.99);
    }

    #[tokio::test]
    async fn detector_reports_no_regions_for_a_dark_frame() {
        let mut detector = ThresholdBoardDetector::new(250);
        let detection = detector.infer(board_frame(4)).await.unwrap();
        assert!(detection.regions.is_empty());
    }

    #[tokio::test]
    async fn segmenter_rejects_empty_detection() {
        let mut segmenter = LumaSegmenter::new(180);
        let empty = BoardDetection {
            frame: board_frame(0),
            regions: Vec::new(),
        };
        assert!(matches!(
            segmenter.infer(empty).await,
            Err(InferenceError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn counter_counts_separated_components() {
        // Two 2x2 blocks with a clear gap in a 8x4 mask.
        let mut mask = vec![0u8; 32];
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1), (5, 2), (6, 2), (5, 3), (6, 3)] {
            mask[y * 8 + x] = 255;
        }
        let mut counter = ComponentPinCounter::new(2);
        let count = counter
            .infer(SegmentationMask {
                width: 8,
                height: 4,
                mask,
            })
            .await
            .unwrap();
        assert_eq!(count, PinCount(2));
    }

    #[tokio::test]
    async fn counter_ignores_specks_below_min_area() {
        let mut mask = vec![0u8; 16];
        mask[5] = 255;
        let mut counter = ComponentPinCounter::new(2);
        let count = counter
            .infer(SegmentationMask {
                width: 4,
                height: 4,
                mask,
            })
            .await
            .unwrap();
        assert_eq!(count, PinCount(0));
    }

    #[tokio::test]
    async fn full_model_chain_counts_the_rendered_pins() {
        let mut detector = ThresholdBoardDetector::new(60);
        let mut segmenter = LumaSegmenter::new(180);
        let mut counter = ComponentPinCounter::new(2);

        let detection = detector.infer(board_frame(12)).await.unwrap();
        let mask = segmenter.infer(detection).await.unwrap();
        let count = counter.infer(mask).await.unwrap();
        assert_eq!(count, PinCount(12));
    }
}
