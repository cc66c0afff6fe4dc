pub mod coordinator;
pub mod model;
pub mod stage;
pub mod types;
pub mod vision;

pub use coordinator::{PipelineCoordinator, PipelineCoordinatorBuilder, RunOutcome};
pub use model::Model;
pub use stage::{StageName, StageState};
pub use types::{BoardDetection, PinCount, Region, SegmentationMask, SubmissionHandle};
