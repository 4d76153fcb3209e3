use async_trait::async_trait;

use parley_types::models::PromptMessage;

use crate::error::ModelError;

/// A language model reachable by a single request/response call.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send the ordered prompt to `model_id` and return the completion text.
    async fn invoke(&self, model_id: &str, messages: &[PromptMessage]) -> Result<String, ModelError>;
}
