use crate::error::InferenceError;
use async_trait::async_trait;

/// One inference model, owned exclusively by the stage task that runs it.
/// Load time and inference time are opaque to the coordinator: both may be
/// arbitrarily slow and either may fail.
#[async_trait]
pub trait Model<I, O>: Send {
    async fn infer(&mut self, input: I) -> Result<O, InferenceError>;
    fn name(&self) -> &'static str;
}
