use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    error::LlmError,
    model::LanguageModel,
    types::{ChatMessage, CompletionRequest, Embedding},
};

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn LanguageModel>,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct EmbedResponse {
    dimensions: usize,
    embedding: Embedding,
}

#[derive(Debug, Serialize)]
struct CompleteResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
}

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/embed", post(embed))
        .route("/complete", post(complete))
        .route("/chat", post(chat))
        .route("/summarize", post(summarize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> String {
    format!("Replicant API ({})", state.model.provider_name())
}

async fn health() -> &'static str {
    "ok"
}

async fn embed(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let embedding = state
        .model
        .embed(&request.text)
        .await
        .map_err(api_error)?;

    Ok(Json(EmbedResponse {
        dimensions: embedding.len(),
        embedding,
    }))
}

async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let text = state.model.complete(request).await.map_err(api_error)?;
    Ok(Json(CompleteResponse { text }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = state.model.chat(request).await.map_err(api_error)?;
    Ok(Json(message))
}

async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let summary = state
        .model
        .summarize(&request.text)
        .await
        .map_err(api_error)?;
    Ok(Json(SummarizeResponse { summary }))
}

fn api_error(error: LlmError) -> ApiError {
    let status = match &error {
        LlmError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LlmError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LlmError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!(?error, %status, "model request failed");
    (status, format!("model error: {error}"))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{
        error::{LlmError, LlmResult},
        model::{LanguageModel, MockLanguageModel},
        types::{CompletionRequest, Embedding},
    };

    use super::{AppState, router};

    struct TimingOutModel;

    #[async_trait]
    impl LanguageModel for TimingOutModel {
        fn provider_name(&self) -> &'static str {
            "timing-out"
        }

        async fn embed(&self, _text: &str) -> LlmResult<Embedding> {
            Err(LlmError::ProviderUnavailable("connection refused".to_owned()))
        }

        async fn complete(&self, _request: CompletionRequest) -> LlmResult<String> {
            Err(LlmError::PollTimeout {
                id: "p1".to_owned(),
                attempts: 3,
                elapsed: Duration::from_secs(3),
            })
        }

        async fn summarize(&self, _text: &str) -> LlmResult<String> {
            Err(LlmError::AuthenticationFailed("bad token".to_owned()))
        }
    }

    fn app(model: Arc<dyn LanguageModel>) -> axum::Router {
        router(AppState { model })
    }

    async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn embed_route_returns_vector_and_dimensions() {
        let (status, body) = post_json(
            app(Arc::new(MockLanguageModel::new(8))),
            "/embed",
            json!({ "text": "hello" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["dimensions"], 8);
        assert_eq!(payload["embedding"].as_array().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn chat_route_returns_assistant_message() {
        let (status, body) = post_json(
            app(Arc::new(MockLanguageModel::default())),
            "/chat",
            json!({ "prompt": "hello", "temperature": 0.2 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["role"], "assistant");
        assert!(
            payload["content"]
                .as_str()
                .is_some_and(|content| content.contains("hello"))
        );
    }

    #[tokio::test]
    async fn summarize_route_returns_summary() {
        let (status, body) = post_json(
            app(Arc::new(MockLanguageModel::default())),
            "/summarize",
            json!({ "text": "First point. Second point." }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["summary"], "Mock summary: First point.");
    }

    #[tokio::test]
    async fn model_errors_map_to_gateway_statuses() {
        let model: Arc<dyn LanguageModel> = Arc::new(TimingOutModel);

        let (status, _) = post_json(app(model.clone()), "/embed", json!({ "text": "x" })).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) =
            post_json(app(model.clone()), "/complete", json!({ "prompt": "x" })).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, body) = post_json(app(model), "/summarize", json!({ "text": "x" })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(String::from_utf8_lossy(&body).contains("bad token"));
    }
}
