use pinwatch::capture::{CaptureLoop, LogDisplay, SyntheticSource};
use pinwatch::config::Configuration;
use pinwatch::error::AppError;
use pinwatch::pipeline::vision::{ComponentPinCounter, LumaSegmenter, ThresholdBoardDetector};
use pinwatch::pipeline::PipelineCoordinator;
use pinwatch::stillness::StillnessDetector;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let configuration = Configuration::load()?;

    let coordinator = Arc::new(
        PipelineCoordinator::builder()
            .board_detector(ThresholdBoardDetector::new(60))
            .segmenter(LumaSegmenter::new(180))
            .pin_counter(ComponentPinCounter::new(2))
            .stage_timeout(configuration.stage_timeout())
            .build()?,
    );

    let detector = StillnessDetector::new(configuration.metric(), configuration.reference_update);
    // Synthetic camera: ten moving frames, then a settled board with 12 pins.
    let source = SyntheticSource::settling(320, 240, 10, 12);
    let capture = CaptureLoop::new(source, LogDisplay, detector, coordinator.clone(), &configuration);

    let cancel = CancellationToken::new();
    let loop_task = tokio::spawn(capture.run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    cancel.cancel();
    if let Err(error) = loop_task.await {
        tracing::error!(error = %error, "capture loop task failed");
    }
    coordinator.shutdown();
    Ok(())
}
