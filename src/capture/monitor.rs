use crate::capture::display::{DisplaySink, DisplaySlot};
use crate::capture::source::FrameSource;
use crate::config::Configuration;
use crate::error::SubmitError;
use crate::pipeline::coordinator::{PipelineCoordinator, RunOutcome};
use crate::pipeline::types::{PinCount, SubmissionHandle};
use crate::stillness::{StillnessDetector, StillnessVerdict};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Orchestrating loop: polls the frame source on a fixed cadence, renders
/// the live view, runs the stillness comparator, and submits a settled
/// frame when the pipeline is free. Capture never blocks on the pipeline;
/// results are picked up by a separate non-blocking poll cadence that is
/// active only while a run is outstanding.
pub struct CaptureLoop<S, D> {
    source: S,
    display: D,
    detector: StillnessDetector,
    coordinator: Arc<PipelineCoordinator>,
    poll_interval: Duration,
    result_poll_interval: Duration,
    awaiting: Option<SubmissionHandle>,
    static_count: u64,
}

impl<S: FrameSource, D: DisplaySink> CaptureLoop<S, D> {
    pub fn new(
        source: S,
        display: D,
        detector: StillnessDetector,
        coordinator: Arc<PipelineCoordinator>,
        configuration: &Configuration,
    ) -> Self {
        Self {
            source,
            display,
            detector,
            coordinator,
            poll_interval: configuration.poll_interval(),
            result_poll_interval: configuration.result_poll_interval(),
            awaiting: None,
            static_count: 0,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut capture_tick = tokio::time::interval(self.poll_interval);
        capture_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut result_tick = tokio::time::interval(self.result_poll_interval);
        result_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = capture_tick.tick() => self.capture_tick(),
                _ = result_tick.tick(), if self.awaiting.is_some() => self.poll_result(),
            }
        }
        self.source.release();
        tracing::info!("capture loop stopped");
    }

    fn capture_tick(&mut self) {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(error = %error, "frame acquisition failed");
                self.display.set_status("frame acquisition failed");
                return;
            }
        };
        self.display.render(&frame, DisplaySlot::Live);

        if self.detector.evaluate(&frame) != StillnessVerdict::Static {
            return;
        }
        // One result at a time: wait out both the gate and our own
        // unharvested outcome before submitting again.
        if self.awaiting.is_some() || !self.coordinator.idle() {
            return;
        }
        match self.coordinator.submit(frame.clone()) {
            Ok(handle) => {
                self.static_count += 1;
                self.display.render(&frame, DisplaySlot::Detected);
                self.display
                    .set_status(&format!("still frame detected (#{})", self.static_count));
                tracing::info!(seq = frame.seq(), detections = self.static_count, "still frame submitted");
                self.awaiting = Some(handle);
            }
            // Lost the gate to another submitter between the check and the
            // set; expected, try again next tick.
            Err(SubmitError::Busy) => {}
            Err(error) => {
                tracing::error!(error = %error, "submission rejected");
                self.display.set_status("pipeline unavailable");
            }
        }
    }

    fn poll_result(&mut self) {
        let Some(handle) = self.awaiting.as_ref() else {
            return;
        };
        let Some(outcome) = self.coordinator.poll(handle) else {
            return;
        };
        match outcome {
            RunOutcome::Count(PinCount(pins)) => {
                tracing::info!(pins, "pipeline run completed");
                self.display.set_status(&format!("pin count: {pins}"));
            }
            RunOutcome::Failed { stage, cause } => {
                self.display
                    .set_status(&format!("{stage} failed: {cause}"));
            }
            RunOutcome::Stalled => {
                self.display.set_status("pipeline stalled, resuming capture");
            }
        }
        self.awaiting = None;
    }
}
