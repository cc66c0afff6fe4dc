use crate::capture::frame::Frame;
use crate::error::{InferenceError, PipelineBuildError, SubmitError};
use crate::pipeline::model::Model;
use crate::pipeline::stage::{spawn_stage, Job, StageFailure, StageHandle, StageName};
use crate::pipeline::types::{BoardDetection, PinCount, SegmentationMask, SubmissionHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What one pipeline run produced. `Stalled` is reported once the stage
/// timeout elapses with no completion; the run is abandoned and any result
/// it produces later is discarded by handle id.
#[derive(Debug)]
pub enum RunOutcome {
    Count(PinCount),
    Failed {
        stage: StageName,
        cause: InferenceError,
    },
    Stalled,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: Uuid,
    submitted_at: Instant,
}

/// Wires the three inference stages into a one-directional chain of
/// capacity-1 hand-off channels and guards them with an at-most-one-in-flight
/// submission gate.
///
/// The gate replaces a work queue on purpose: with a single submission in
/// flight, no stage can ever be asked to buffer more than one item, so
/// queue growth is impossible by construction. A still frame detected while
/// a run is in flight is dropped, not buffered.
pub struct PipelineCoordinator {
    gate: AtomicBool,
    in_flight: Mutex<Option<InFlight>>,
    frame_tx: mpsc::Sender<Job<Frame>>,
    done_rx: Mutex<mpsc::Receiver<Job<PinCount>>>,
    failure_rx: Mutex<mpsc::Receiver<StageFailure>>,
    stage_timeout: Duration,
    stages: Vec<StageHandle>,
    cancel: CancellationToken,
}

impl PipelineCoordinator {
    pub fn builder() -> PipelineCoordinatorBuilder {
        PipelineCoordinatorBuilder::new()
    }

    /// True when no submission is in flight. Cheap enough for the capture
    /// loop to check on every tick.
    pub fn idle(&self) -> bool {
        !self.gate.load(Ordering::Acquire)
    }

    /// Hands a frame to the first stage. Fails with `Busy` while a prior
    /// submission has not completed; the caller is expected to drop the
    /// frame and keep capturing.
    pub fn submit(&self, frame: Frame) -> Result<SubmissionHandle, SubmitError> {
        if self
            .gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }

        let id = Uuid::new_v4();
        // The gate was free, so the capacity-1 channel has room.
        if let Err(error) = self.frame_tx.try_send(Job {
            submission: id,
            payload: frame,
        }) {
            self.gate.store(false, Ordering::Release);
            return match error {
                TrySendError::Closed(_) => Err(SubmitError::Closed),
                TrySendError::Full(_) => Err(SubmitError::Busy),
            };
        }
        *self.lock_in_flight() = Some(InFlight {
            id,
            submitted_at: Instant::now(),
        });
        tracing::info!(submission = %id, "frame submitted to pipeline");
        Ok(SubmissionHandle { id })
    }

    /// Non-blocking completion check, safe to call from a different task
    /// than the one that called `submit`. Returns the outcome exactly once
    /// per run and releases the gate when it does, whether the run
    /// completed, failed, or timed out.
    pub fn poll(&self, handle: &SubmissionHandle) -> Option<RunOutcome> {
        let current = match *self.lock_in_flight() {
            Some(current) if current.id == handle.id => current,
            _ => return None,
        };

        {
            let mut failure_rx = self
                .failure_rx
                .lock()
                .expect("failure channel lock poisoned");
            while let Ok(failure) = failure_rx.try_recv() {
                if failure.submission == handle.id {
                    self.finish(handle.id);
                    return Some(RunOutcome::Failed {
                        stage: failure.stage,
                        cause: failure.cause,
                    });
                }
                tracing::debug!(submission = %failure.submission, "discarding failure from abandoned run");
            }
        }

        {
            let mut done_rx = self.done_rx.lock().expect("done channel lock poisoned");
            while let Ok(done) = done_rx.try_recv() {
                if done.submission == handle.id {
                    self.finish(handle.id);
                    return Some(RunOutcome::Count(done.payload));
                }
                tracing::debug!(submission = %done.submission, "discarding result from abandoned run");
            }
        }

        if current.submitted_at.elapsed() >= self.stage_timeout {
            tracing::warn!(submission = %handle.id, timeout = ?self.stage_timeout, "pipeline stalled, releasing gate");
            self.finish(handle.id);
            return Some(RunOutcome::Stalled);
        }
        None
    }

    /// Cancels and aborts the stage tasks. Queued hand-offs are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for stage in &self.stages {
            tracing::debug!(stage = %stage.name, state = ?*stage.state.borrow(), "stage shutdown requested");
            stage.task.abort();
        }
    }

    fn finish(&self, id: Uuid) {
        *self.lock_in_flight() = None;
        self.gate.store(false, Ordering::Release);
        tracing::debug!(submission = %id, "gate released");
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().expect("in-flight lock poisoned")
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct PipelineCoordinatorBuilder {
    board_detector: Option<Box<dyn Model<Frame, BoardDetection>>>,
    segmenter: Option<Box<dyn Model<BoardDetection, SegmentationMask>>>,
    pin_counter: Option<Box<dyn Model<SegmentationMask, PinCount>>>,
    stage_timeout: Duration,
}

impl PipelineCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            board_detector: None,
            segmenter: None,
            pin_counter: None,
            stage_timeout: Duration::from_secs(30),
        }
    }

    pub fn board_detector(mut self, model: impl Model<Frame, BoardDetection> + 'static) -> Self {
        self.board_detector = Some(Box::new(model));
        self
    }

    pub fn segmenter(mut self, model: impl Model<BoardDetection, SegmentationMask> + 'static) -> Self {
        self.segmenter = Some(Box::new(model));
        self
    }

    pub fn pin_counter(mut self, model: impl Model<SegmentationMask, PinCount> + 'static) -> Self {
        self.pin_counter = Some(Box::new(model));
        self
    }

    /// Bounds how long the gate may stay occupied by one run. Without it a
    /// stalled model would keep the pipeline busy forever.
    pub fn stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Spawns the three stage tasks and wires their hand-off channels.
    /// Fails if any model is missing; the pipeline never starts
    /// half-initialized.
    pub fn build(self) -> Result<PipelineCoordinator, PipelineBuildError> {
        let board_detector = self
            .board_detector
            .ok_or(PipelineBuildError::MissingModel("board detector"))?;
        let segmenter = self
            .segmenter
            .ok_or(PipelineBuildError::MissingModel("segmenter"))?;
        let pin_counter = self
            .pin_counter
            .ok_or(PipelineBuildError::MissingModel("pin counter"))?;

        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (detection_tx, detection_rx) = mpsc::channel(1);
        let (mask_tx, mask_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = mpsc::channel(1);
        // One failure slot per stage so an abandoned run can never block a
        // live one from reporting.
        let (failure_tx, failure_rx) = mpsc::channel(3);
        let cancel = CancellationToken::new();

        let stages = vec![
            spawn_stage(
                StageName::BoardDetector,
                board_detector,
                frame_rx,
                detection_tx,
                failure_tx.clone(),
                cancel.child_token(),
            ),
            spawn_stage(
                StageName::Segmenter,
                segmenter,
                detection_rx,
                mask_tx,
                failure_tx.clone(),
                cancel.child_token(),
            ),
            spawn_stage(
                StageName::PinCounter,
                pin_counter,
                mask_rx,
                done_tx,
                failure_tx,
                cancel.child_token(),
            ),
        ];
        tracing::info!("pipeline stages started");

        Ok(PipelineCoordinator {
            gate: AtomicBool::new(false),
            in_flight: Mutex::new(None),
            frame_tx,
            done_rx: Mutex::new(done_rx),
            failure_rx: Mutex::new(failure_rx),
            stage_timeout: self.stage_timeout,
            stages,
            cancel,
        })
    }
}

impl Default for PipelineCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Region;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::sync::Arc;

    fn test_frame(seq: u64) -> Frame {
        let image = DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
            8,
            8,
            Rgb([90, 90, 90]),
        ));
        Frame::new(seq, image)
    }

    fn full_region() -> Region {
        Region {
            x: 0,
            y: 0,
            width: 8,
            height: 8,
            confidence: 1.0,
        }
    }

    struct PassThroughDetector;

    #[async_trait]
    impl Model<Frame, BoardDetection> for PassThroughDetector {
        async fn infer(&mut self, input: Frame) -> Result<BoardDetection, InferenceError> {
            Ok(BoardDetection {
                frame: input,
                regions: vec![full_region()],
            })
        }

        fn name(&self) -> &'static str {
            "pass-through-detector"
        }
    }

    struct FixedSegmenter {
        delay: Duration,
    }

    #[async_trait]
    impl Model<BoardDetection, SegmentationMask> for FixedSegmenter {
        async fn infer(&mut self, _input: BoardDetection) -> Result<SegmentationMask, InferenceError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(SegmentationMask {
                width: 8,
                height: 8,
                mask: vec![255; 64],
            })
        }

        fn name(&self) -> &'static str {
            "fixed-segmenter"
        }
    }

    struct FailingSegmenter;

    #[async_trait]
    impl Model<BoardDetection, SegmentationMask> for FailingSegmenter {
        async fn infer(&mut self, _input: BoardDetection) -> Result<SegmentationMask, InferenceError> {
            Err(InferenceError::Execution("segmentation head crashed".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing-segmenter"
        }
    }

    struct FixedCounter {
        count: u32,
    }

    #[async_trait]
    impl Model<SegmentationMask, PinCount> for FixedCounter {
        async fn infer(&mut self, _input: SegmentationMask) -> Result<PinCount, InferenceError> {
            Ok(PinCount(self.count))
        }

        fn name(&self) -> &'static str {
            "fixed-counter"
        }
    }

    /// Sleeps through its first invocation long enough to get abandoned,
    /// then answers promptly; returns the invocation ordinal as the count.
    struct LaggedCounter {
        first_call_delay: Duration,
        calls: u32,
    }

    #[async_trait]
    impl Model<SegmentationMask, PinCount> for LaggedCounter {
        async fn infer(&mut self, _input: SegmentationMask) -> Result<PinCount, InferenceError> {
            self.calls += 1;
            if self.calls == 1 {
                tokio::time::sleep(self.first_call_delay).await;
            }
            Ok(PinCount(self.calls))
        }

        fn name(&self) -> &'static str {
            "lagged-counter"
        }
    }

    fn coordinator_with(
        segmenter_delay: Duration,
        count: u32,
        stage_timeout: Duration,
    ) -> PipelineCoordinator {
        PipelineCoordinator::builder()
            .board_detector(PassThroughDetector)
            .segmenter(FixedSegmenter {
                delay: segmenter_delay,
            })
            .pin_counter(FixedCounter { count })
            .stage_timeout(stage_timeout)
            .build()
            .expect("building test pipeline")
    }

    async fn wait_for_outcome(
        coordinator: &PipelineCoordinator,
        handle: &SubmissionHandle,
    ) -> RunOutcome {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(outcome) = coordinator.poll(handle) {
                    return outcome;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no outcome within five seconds")
    }

    #[tokio::test]
    async fn builder_without_models_fails() {
        let result = PipelineCoordinator::builder().build();
        assert!(matches!(
            result,
            Err(PipelineBuildError::MissingModel("board detector"))
        ));
    }

    #[tokio::test]
    async fn end_to_end_run_returns_count_and_frees_gate() {
        let coordinator = coordinator_with(Duration::ZERO, 12, Duration::from_secs(5));
        let handle = coordinator.submit(test_frame(1)).expect("first submit");
        assert!(!coordinator.idle());

        let outcome = wait_for_outcome(&coordinator, &handle).await;
        assert!(matches!(outcome, RunOutcome::Count(PinCount(12))));
        assert!(coordinator.idle());

        // Polling a finished handle yields nothing further.
        assert!(coordinator.poll(&handle).is_none());
        assert!(coordinator.submit(test_frame(2)).is_ok());
    }

    #[tokio::test]
    async fn submit_while_in_flight_returns_busy() {
        let coordinator = coordinator_with(Duration::from_millis(200), 3, Duration::from_secs(5));
        let handle = coordinator.submit(test_frame(1)).expect("first submit");

        assert_eq!(coordinator.submit(test_frame(2)), Err(SubmitError::Busy));

        let outcome = wait_for_outcome(&coordinator, &handle).await;
        assert!(matches!(outcome, RunOutcome::Count(PinCount(3))));
        assert!(coordinator.submit(test_frame(3)).is_ok());
    }

    #[tokio::test]
    async fn concurrent_submissions_admit_exactly_one() {
        let coordinator = Arc::new(coordinator_with(
            Duration::from_millis(200),
            1,
            Duration::from_secs(5),
        ));
        let mut tasks = Vec::new();
        for seq in 0..8 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.submit(test_frame(seq)).is_ok()
            }));
        }
        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn stage_failure_surfaces_and_releases_gate() {
        let coordinator = PipelineCoordinator::builder()
            .board_detector(PassThroughDetector)
            .segmenter(FailingSegmenter)
            .pin_counter(FixedCounter { count: 0 })
            .stage_timeout(Duration::from_secs(5))
            .build()
            .expect("building test pipeline");

        let handle = coordinator.submit(test_frame(1)).expect("submit");
        let outcome = wait_for_outcome(&coordinator, &handle).await;
        match outcome {
            RunOutcome::Failed { stage, cause } => {
                assert_eq!(stage, StageName::Segmenter);
                assert!(matches!(cause, InferenceError::Execution(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(coordinator.idle());
        assert!(coordinator.submit(test_frame(2)).is_ok());
    }

    #[tokio::test]
    async fn stalled_run_times_out_and_late_result_is_discarded() {
        let coordinator = PipelineCoordinator::builder()
            .board_detector(PassThroughDetector)
            .segmenter(FixedSegmenter {
                delay: Duration::ZERO,
            })
            .pin_counter(LaggedCounter {
                first_call_delay: Duration::from_millis(150),
                calls: 0,
            })
            .stage_timeout(Duration::from_millis(40))
            .build()
            .expect("building test pipeline");

        let first = coordinator.submit(test_frame(1)).expect("first submit");
        let outcome = wait_for_outcome(&coordinator, &first).await;
        assert!(matches!(outcome, RunOutcome::Stalled));
        assert!(coordinator.idle());

        // Let the abandoned run finish in the background; its count 1 now
        // sits in the result slot. The second run must see its own count,
        // not the stale one.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let second = coordinator.submit(test_frame(2)).expect("second submit");
        let outcome = wait_for_outcome(&coordinator, &second).await;
        assert!(matches!(outcome, RunOutcome::Count(PinCount(2))));
    }
}
