pub mod capture;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stillness;

pub use capture::{CaptureLoop, DisplaySink, Frame, FrameSource, LogDisplay};
pub use config::Configuration;
pub use error::AppError;
pub use pipeline::{PipelineCoordinator, RunOutcome};
pub use stillness::{StillnessDetector, StillnessVerdict};
