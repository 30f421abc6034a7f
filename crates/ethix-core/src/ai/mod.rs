pub mod mistral;

pub use mistral::MistralClient;

use async_trait::async_trait;

use crate::error::CompletionError;
use crate::state::ChatTurn;

/// Anything that can turn a conversation plus a new user message into a reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        history: &[ChatTurn],
        user_text: &str,
    ) -> Result<String, CompletionError>;
}
