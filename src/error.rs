use thiserror::Error;

// Main application error type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineBuildError),
    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

// Camera / frame source errors. Always transient from the capture loop's
// point of view: a failed read skips the tick, it never stops the loop.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Failed to read frame: {0}")]
    Read(String),
    #[error("Frame source is no longer available")]
    Disconnected,
}

// Model inference errors, recorded per-submission by the stage that hit them.
#[derive(Error, Debug, Clone)]
pub enum InferenceError {
    #[error("Model execution failed: {0}")]
    Execution(String),
    #[error("Input rejected: {0}")]
    BadInput(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    // Expected in steady state while a run is in flight; callers skip the tick.
    #[error("A submission is already in flight")]
    Busy,
    #[error("The pipeline has shut down")]
    Closed,
}

#[derive(Error, Debug)]
pub enum PipelineBuildError {
    #[error("The {0} model was not provided")]
    MissingModel(&'static str),
    #[error("Failed to load the {stage} model: {cause}")]
    ModelLoad {
        stage: &'static str,
        cause: String,
    },
}
