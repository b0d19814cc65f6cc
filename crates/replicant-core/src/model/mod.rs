mod mock;
mod replicate;

use async_trait::async_trait;

use crate::{
    error::LlmResult,
    types::{ChatMessage, CompletionRequest, Embedding},
};

pub use mock::MockLanguageModel;
pub use replicate::{ReplicateLlm, ReplicateOptions, SUMMARIZE_MAX_TOKENS, join_completion_output};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn embed(&self, text: &str) -> LlmResult<Embedding>;

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String>;

    /// Providers without a chat endpoint answer through `complete`.
    async fn chat(&self, request: CompletionRequest) -> LlmResult<ChatMessage> {
        let text = self.complete(request).await?;
        Ok(ChatMessage::assistant(text))
    }

    async fn summarize(&self, text: &str) -> LlmResult<String>;
}
