use crate::capture::frame::Frame;

/// Where a frame lands in the monitor UI: the live view or the
/// "detected still frame" panel next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySlot {
    Live,
    Detected,
}

/// Output-only display collaborator. The core writes frames and status
/// text to it and never reads anything back.
pub trait DisplaySink: Send {
    fn render(&mut self, frame: &Frame, slot: DisplaySlot);
    fn set_status(&mut self, text: &str);
}

/// Display sink backed by the tracing subscriber, used when running
/// without a UI.
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn render(&mut self, frame: &Frame, slot: DisplaySlot) {
        tracing::debug!(seq = frame.seq(), ?slot, "rendered frame");
    }

    fn set_status(&mut self, text: &str) {
        tracing::info!(status = text, "display status");
    }
}
