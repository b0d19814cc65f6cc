use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Model, ModelVersion, Prediction, PredictionClient, split_model_name};
use crate::error::{LlmError, LlmResult};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
}

impl fmt::Debug for ReplicateClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CreatePredictionRequest<'a> {
    version: &'a str,
    input: Value,
}

impl ReplicateClient {
    pub fn new(api_token: impl Into<String>) -> LlmResult<Self> {
        Self::with_base_url(api_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> LlmResult<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(LlmError::AuthenticationFailed(
                "Replicate API token is empty".to_owned(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> LlmResult<T> {
        let response = builder
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|error| {
                warn!(?error, "replicate request failed");
                LlmError::from_transport(error)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_detail(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_owned()
            });
            warn!(%status, %message, "replicate returned error status");
            return Err(LlmError::from_status(status, message));
        }

        response.json::<T>().await.map_err(|error| {
            warn!(?error, "failed to deserialize replicate response");
            LlmError::from_transport(error)
        })
    }
}

#[async_trait]
impl PredictionClient for ReplicateClient {
    async fn retrieve_model(&self, name: &str) -> LlmResult<Model> {
        let (owner, model) = split_model_name(name)?;
        debug!(model = %name, "retrieving replicate model");
        self.send(
            self.client
                .get(format!("{}/models/{owner}/{model}", self.base_url)),
        )
        .await
    }

    async fn create_prediction(
        &self,
        version: &ModelVersion,
        input: Value,
    ) -> LlmResult<Prediction> {
        let payload = CreatePredictionRequest {
            version: &version.id,
            input,
        };
        self.send(
            self.client
                .post(format!("{}/predictions", self.base_url))
                .json(&payload),
        )
        .await
    }

    async fn get_prediction(&self, id: &str) -> LlmResult<Prediction> {
        self.send(
            self.client
                .get(format!("{}/predictions/{id}", self.base_url)),
        )
        .await
    }
}

fn extract_error_detail(body: &str) -> Option<String> {
    let payload = serde_json::from_str::<Value>(body).ok();
    let detail = payload.as_ref().and_then(|payload| {
        payload
            .get("detail")
            .or_else(|| payload.get("title"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    });

    detail.or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    })
}
