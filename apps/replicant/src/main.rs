use std::sync::Arc;

use replicant_core::{
    config::AppConfig,
    http::{self, AppState},
    model::{LanguageModel, MockLanguageModel, ReplicateLlm},
    predictions::ReplicateClient,
    prompt::PromptTemplate,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let model = build_model(&config)?;

    let app = http::router(AppState { model });
    let listener = TcpListener::bind(config.http_bind).await?;
    info!("Replicant HTTP API listening on {}", config.http_bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();
}

fn build_model(config: &AppConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let provider = config.model_provider.to_lowercase();
    match provider.as_str() {
        "replicate" => {
            if config.replicate_api_token.is_some() {
                build_replicate(config)
            } else {
                warn!("MODEL_PROVIDER=replicate but REPLICATE_API_TOKEN is missing; using mock");
                Ok(build_mock(config))
            }
        }
        "mock" => {
            warn!("MODEL_PROVIDER=mock; using mock language model");
            Ok(build_mock(config))
        }
        "auto" => auto_model(config),
        other => {
            warn!(
                provider = %other,
                "unknown MODEL_PROVIDER value; valid values are auto|replicate|mock; falling back to auto"
            );
            auto_model(config)
        }
    }
}

fn auto_model(config: &AppConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    if config.replicate_api_token.is_some() {
        build_replicate(config)
    } else {
        warn!("No REPLICATE_API_TOKEN configured; using mock language model");
        Ok(build_mock(config))
    }
}

fn build_replicate(config: &AppConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let token = config.replicate_api_token.clone().unwrap_or_default();
    let client = ReplicateClient::with_base_url(token, config.replicate_base_url.clone())?;
    let mut model = ReplicateLlm::with_client(Arc::new(client), config.replicate.clone());

    if let Some(path) = &config.summarize_template_path {
        model = model.with_summarize_template(PromptTemplate::load_from_path(path)?);
        info!(path = %path.display(), "loaded custom summarize template");
    }

    info!(
        completion_model = %config.replicate.completion_model_name,
        embeddings_model = %config.replicate.embeddings_model_name,
        poll_interval_ms = config.replicate.poll.interval_ms,
        "using Replicate language model"
    );
    Ok(Arc::new(model))
}

fn build_mock(config: &AppConfig) -> Arc<dyn LanguageModel> {
    Arc::new(MockLanguageModel::new(config.replicate.dimensions))
}
