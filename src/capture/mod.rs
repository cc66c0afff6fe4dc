pub mod display;
pub mod frame;
pub mod monitor;
pub mod source;

pub use display::{DisplaySink, DisplaySlot, LogDisplay};
pub use frame::Frame;
pub use monitor::CaptureLoop;
pub use source::{FrameSource, SyntheticSource};
