use crate::capture::frame::Frame;
use crate::error::AcquisitionError;
use image::{DynamicImage, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Camera abstraction. Implementations yield the next frame on demand and
/// may fail transiently; the capture loop logs and keeps polling.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, AcquisitionError>;

    /// Called once on shutdown.
    fn release(&mut self) {}
}

/// Deterministic stand-in for a real camera: emits noise frames while the
/// scene is "being handled", then settles on a board image with a fixed
/// number of pins. Used by the demo binary and the tests.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    moving_ticks: u32,
    pins: u32,
    tick: u32,
    seq: u64,
    rng: StdRng,
    released: bool,
}

impl SyntheticSource {
    pub fn settling(width: u32, height: u32, moving_ticks: u32, pins: u32) -> Self {
        Self {
            width,
            height,
            moving_ticks,
            pins,
            tick: 0,
            seq: 0,
            rng: StdRng::seed_from_u64(0x5eed),
            released: false,
        }
    }

    fn noise_image(&mut self) -> DynamicImage {
        let image = RgbImage::from_fn(self.width, self.height, |_, _| {
            Rgb([
                self.rng.random::<u8>(),
                self.rng.random::<u8>(),
                self.rng.random::<u8>(),
            ])
        });
        DynamicImage::ImageRgb8(image)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Disconnected);
        }
        let image = if self.tick < self.moving_ticks {
            self.noise_image()
        } else {
            board_image(self.width, self.height, self.pins)
        };
        self.tick += 1;
        self.seq += 1;
        Ok(Frame::new(self.seq, image))
    }

    fn release(&mut self) {
        self.released = true;
        tracing::debug!("synthetic source released");
    }
}

const BACKGROUND_LUMA: u8 = 20;
const BOARD_LUMA: u8 = 100;
const PIN_LUMA: u8 = 230;
const PIN_SIZE: u32 = 3;
const PIN_STRIDE: u32 = 8;

/// Renders a dark background, a mid-gray board covering the central region,
/// and `pins` bright 3x3 pads laid out on a grid inside the board. The pads
/// are spaced so each one is its own connected component.
pub fn board_image(width: u32, height: u32, pins: u32) -> DynamicImage {
    let bx0 = width / 8;
    let bx1 = width - width / 8;
    let by0 = height / 8;
    let by1 = height - height / 8;
    let per_row = ((bx1 - bx0).saturating_sub(PIN_STRIDE) / PIN_STRIDE).max(1);

    let mut image = RgbImage::from_pixel(
        width,
        height,
        Rgb([BACKGROUND_LUMA, BACKGROUND_LUMA, BACKGROUND_LUMA]),
    );
    for y in by0..by1 {
        for x in bx0..bx1 {
            image.put_pixel(x, y, Rgb([BOARD_LUMA, BOARD_LUMA, BOARD_LUMA]));
        }
    }
    for pin in 0..pins {
        let px = bx0 + 4 + (pin % per_row) * PIN_STRIDE;
        let py = by0 + 4 + (pin / per_row) * PIN_STRIDE;
        for dy in 0..PIN_SIZE {
            for dx in 0..PIN_SIZE {
                let (x, y) = (px + dx, py + dy);
                if x < bx1 && y < by1 {
                    image.put_pixel(x, y, Rgb([PIN_LUMA, PIN_LUMA, PIN_LUMA]));
                }
            }
        }
    }
    DynamicImage::ImageRgb8(image)
}
