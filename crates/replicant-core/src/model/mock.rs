use async_trait::async_trait;

use super::LanguageModel;
use crate::{
    error::LlmResult,
    types::{CompletionRequest, Embedding},
};

const DEFAULT_MOCK_DIMENSIONS: usize = 384;

/// Offline stand-in used when no provider token is configured.
#[derive(Debug, Clone)]
pub struct MockLanguageModel {
    dimensions: usize,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DIMENSIONS)
    }
}

impl MockLanguageModel {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn embed(&self, text: &str) -> LlmResult<Embedding> {
        Ok(pseudo_embedding(text, self.dimensions))
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        Ok(format!("Replicant mock reply.\n\nPrompt: {}", request.prompt))
    }

    async fn summarize(&self, text: &str) -> LlmResult<String> {
        let first_sentence = text
            .split_inclusive(['.', '!', '?'])
            .next()
            .unwrap_or_default()
            .trim();
        Ok(format!("Mock summary: {first_sentence}"))
    }
}

/// Deterministic unit-range vector derived from an FNV-1a hash of `text`.
fn pseudo_embedding(text: &str, dimensions: usize) -> Embedding {
    let mut state = text.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    });

    (0..dimensions)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{
        model::LanguageModel,
        types::{ChatRole, CompletionRequest},
    };

    use super::MockLanguageModel;

    #[tokio::test]
    async fn embeddings_are_deterministic_and_sized() {
        let model = MockLanguageModel::new(16);
        let first = model.embed("hello").await.expect("embed");
        let second = model.embed("hello").await.expect("embed");
        let other = model.embed("goodbye").await.expect("embed");

        assert_eq!(first.len(), 16);
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.iter().all(|value| (-1.0..=1.0).contains(value)));
    }

    #[tokio::test]
    async fn chat_echoes_prompt_as_assistant() {
        let model = MockLanguageModel::default();
        let message = model
            .chat(CompletionRequest::new("hello"))
            .await
            .expect("chat");

        assert_eq!(message.role, ChatRole::Assistant);
        assert!(message.content.contains("Prompt: hello"));
    }

    #[tokio::test]
    async fn summary_keeps_first_sentence() {
        let model = MockLanguageModel::default();
        let summary = model
            .summarize("Rust is fast. It is also safe.")
            .await
            .expect("summarize");
        assert_eq!(summary, "Mock summary: Rust is fast.");
    }
}
