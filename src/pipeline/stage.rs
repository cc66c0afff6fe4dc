use crate::error::InferenceError;
use crate::pipeline::model::Model;
use std::fmt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    BoardDetector,
    Segmenter,
    PinCounter,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageName::BoardDetector => write!(f, "board detector"),
            StageName::Segmenter => write!(f, "segmenter"),
            StageName::PinCounter => write!(f, "pin counter"),
        }
    }
}

/// Observable stage lifecycle. A stage returns to `Idle` as soon as it has
/// forwarded its output or recorded its failure, regardless of whether the
/// downstream stage has consumed anything yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    Running,
    Done,
    Failed,
}

/// Payload travelling through a hand-off channel, tagged with the
/// submission that owns it.
#[derive(Debug)]
pub(crate) struct Job<T> {
    pub submission: Uuid,
    pub payload: T,
}

/// Failure record sent straight to the coordinator so the gate is released
/// even though no output reaches the terminal stage.
#[derive(Debug)]
pub(crate) struct StageFailure {
    pub submission: Uuid,
    pub stage: StageName,
    pub cause: InferenceError,
}

pub(crate) struct StageHandle {
    pub name: StageName,
    pub state: watch::Receiver<StageState>,
    pub task: tokio::task::JoinHandle<()>,
}

/// Runs one stage as its own task: block on the capacity-1 input channel,
/// invoke the model, forward downstream on success or report the failure.
/// The task exits when cancelled or when either side of its channels closes.
pub(crate) fn spawn_stage<I, O>(
    name: StageName,
    mut model: Box<dyn Model<I, O>>,
    mut input_rx: mpsc::Receiver<Job<I>>,
    output_tx: mpsc::Sender<Job<O>>,
    failure_tx: mpsc::Sender<StageFailure>,
    cancel: CancellationToken,
) -> StageHandle
where
    I: Send + 'static,
    O: Send + 'static,
{
    let (state_tx, state_rx) = watch::channel(StageState::Idle);
    let task = tokio::spawn(async move {
        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => break,
                received = input_rx.recv() => match received {
                    Some(job) => job,
                    None => break,
                },
            };
            state_tx.send_replace(StageState::Running);
            tracing::debug!(stage = %name, model = model.name(), submission = %job.submission, "stage running");
            match model.infer(job.payload).await {
                Ok(payload) => {
                    state_tx.send_replace(StageState::Done);
                    let forwarded = output_tx
                        .send(Job {
                            submission: job.submission,
                            payload,
                        })
                        .await;
                    if forwarded.is_err() {
                        break;
                    }
                }
                Err(cause) => {
                    state_tx.send_replace(StageState::Failed);
                    tracing::warn!(stage = %name, submission = %job.submission, error = %cause, "stage inference failed");
                    let reported = failure_tx
                        .send(StageFailure {
                            submission: job.submission,
                            stage: name,
                            cause,
                        })
                        .await;
                    if reported.is_err() {
                        break;
                    }
                }
            }
            state_tx.send_replace(StageState::Idle);
        }
        tracing::debug!(stage = %name, "stage task exiting");
    });
    StageHandle {
        name,
        state: state_rx,
        task,
    }
}
