use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::LanguageModel;
use crate::{
    error::{LlmError, LlmResult},
    predictions::{ModelVersion, PollPolicy, PredictionClient, ReplicateClient, wait_for_completion},
    prompt::PromptTemplate,
    types::{CompletionRequest, Embedding},
};

/// Token budget for summaries; fits the context window of every default model.
pub const SUMMARIZE_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateOptions {
    pub temperature: f32,
    pub completion_model_name: String,
    pub embeddings_model_name: String,
    pub dimensions: usize,
    pub poll: PollPolicy,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            // Lowest temperature Replicate accepts.
            temperature: 0.01,
            completion_model_name: "replicate/vicuna-13b".to_owned(),
            embeddings_model_name: "creatorrr/all-mpnet-base-v2".to_owned(),
            dimensions: 384,
            poll: PollPolicy::default(),
        }
    }
}

/// [`LanguageModel`] backed by Replicate predictions.
///
/// Model versions are looked up on first use and kept for the lifetime of
/// the adapter. Build a new adapter to pick up a newly published version.
pub struct ReplicateLlm {
    client: Arc<dyn PredictionClient>,
    options: ReplicateOptions,
    summarize_template: Option<PromptTemplate>,
    completion_version: OnceCell<ModelVersion>,
    embeddings_version: OnceCell<ModelVersion>,
}

impl ReplicateLlm {
    pub fn new(api_token: impl Into<String>, options: ReplicateOptions) -> LlmResult<Self> {
        let client = ReplicateClient::new(api_token)?;
        Ok(Self::with_client(Arc::new(client), options))
    }

    pub fn with_client(client: Arc<dyn PredictionClient>, options: ReplicateOptions) -> Self {
        Self {
            client,
            options,
            summarize_template: None,
            completion_version: OnceCell::new(),
            embeddings_version: OnceCell::new(),
        }
    }

    /// Replaces the bundled summarization template.
    pub fn with_summarize_template(mut self, template: PromptTemplate) -> Self {
        self.summarize_template = Some(template);
        self
    }

    pub fn options(&self) -> &ReplicateOptions {
        &self.options
    }

    /// The request `summarize` hands to `complete`.
    pub fn summarize_request(&self, text: &str) -> LlmResult<CompletionRequest> {
        let prompt = match &self.summarize_template {
            Some(template) => template.format_text(text)?,
            None => PromptTemplate::summarize()?.format_text(text)?,
        };

        Ok(CompletionRequest::new(prompt)
            .with_temperature(self.options.temperature)
            .with_max_tokens(SUMMARIZE_MAX_TOKENS))
    }

    async fn completion_version(&self) -> LlmResult<&ModelVersion> {
        self.completion_version
            .get_or_try_init(|| self.resolve_version(&self.options.completion_model_name))
            .await
    }

    async fn embeddings_version(&self) -> LlmResult<&ModelVersion> {
        self.embeddings_version
            .get_or_try_init(|| self.resolve_version(&self.options.embeddings_model_name))
            .await
    }

    async fn resolve_version(&self, model_name: &str) -> LlmResult<ModelVersion> {
        let model = self.client.retrieve_model(model_name).await?;
        let version = model
            .latest_version
            .ok_or_else(|| LlmError::ModelVersionMissing(model_name.to_owned()))?;
        info!(model = %model_name, version = %version.id, "resolved replicate model version");
        Ok(version)
    }

    async fn run_prediction(&self, version: &ModelVersion, input: Value) -> LlmResult<Value> {
        let prediction = self.client.create_prediction(version, input).await?;
        info!(
            prediction_id = %prediction.id,
            version = %version.id,
            status = %prediction.status,
            "submitted replicate prediction"
        );

        let finished = wait_for_completion(self.client.as_ref(), prediction, &self.options.poll)
            .await?;
        info!(
            prediction_id = %finished.id,
            status = %finished.status,
            "replicate prediction finished"
        );

        finished.into_output().inspect_err(|error| {
            warn!(?error, "replicate prediction did not succeed");
        })
    }
}

#[async_trait]
impl LanguageModel for ReplicateLlm {
    fn provider_name(&self) -> &'static str {
        "replicate"
    }

    async fn embed(&self, text: &str) -> LlmResult<Embedding> {
        let version = self.embeddings_version().await?;
        let output = self.run_prediction(version, json!({ "input": text })).await?;

        let embedding: Embedding = serde_json::from_value(output).map_err(|error| {
            LlmError::UnexpectedOutput(format!("embedding is not a numeric vector: {error}"))
        })?;
        if embedding.len() != self.options.dimensions {
            warn!(
                expected = self.options.dimensions,
                actual = embedding.len(),
                model = %self.options.embeddings_model_name,
                "embedding dimension differs from configuration"
            );
        }

        Ok(embedding)
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        if request.has_generation_params() {
            // Replicate's completion models take only the prompt here.
            debug!(
                temperature = ?request.temperature,
                max_tokens = ?request.max_tokens,
                "generation params are not forwarded to replicate"
            );
        }

        let version = self.completion_version().await?;
        let output = self
            .run_prediction(version, json!({ "prompt": request.prompt }))
            .await?;

        join_completion_output(output)
    }

    async fn summarize(&self, text: &str) -> LlmResult<String> {
        let request = self.summarize_request(text)?;
        self.complete(request).await
    }
}

/// Completion models stream text as fragments, and the first fragment comes
/// back without its trailing space. Restores it and joins the fragments.
pub fn join_completion_output(output: Value) -> LlmResult<String> {
    match output {
        Value::String(text) => Ok(text),
        Value::Array(fragments) => {
            let mut joined = String::new();
            for (index, fragment) in fragments.iter().enumerate() {
                let text = fragment.as_str().ok_or_else(|| {
                    LlmError::UnexpectedOutput(format!(
                        "completion fragment {index} is not a string: {fragment}"
                    ))
                })?;
                joined.push_str(text);
                if index == 0 {
                    joined.push(' ');
                }
            }
            Ok(joined)
        }
        other => Err(LlmError::UnexpectedOutput(format!(
            "completion output is neither text nor fragments: {other}"
        ))),
    }
}
