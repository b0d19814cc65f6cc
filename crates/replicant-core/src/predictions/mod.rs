mod poll;
mod replicate;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, LlmResult};

pub use poll::{PollPolicy, wait_for_completion};
pub use replicate::{DEFAULT_BASE_URL, ReplicateClient};

/// Job-oriented inference API: every call becomes a prediction that is
/// polled until it reaches a terminal status.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn retrieve_model(&self, name: &str) -> LlmResult<Model>;

    async fn create_prediction(&self, version: &ModelVersion, input: Value)
    -> LlmResult<Prediction>;

    /// Re-reads the current state of a prediction.
    async fn get_prediction(&self, id: &str) -> LlmResult<Prediction>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub latest_version: Option<ModelVersion>,
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded
                | PredictionStatus::Failed
                | PredictionStatus::Canceled
                | PredictionStatus::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Aborted => "aborted",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Consumes a finished prediction, yielding its output on success.
    pub fn into_output(self) -> LlmResult<Value> {
        match self.status {
            PredictionStatus::Succeeded => Ok(self.output),
            status => Err(LlmError::PredictionFailed {
                error: self.error_message(),
                id: self.id,
                status,
            }),
        }
    }
}

/// Splits `owner/name`, rejecting anything else.
pub fn split_model_name(name: &str) -> LlmResult<(&str, &str)> {
    match name.split_once('/') {
        Some((owner, model)) if !owner.is_empty() && !model.is_empty() && !model.contains('/') => {
            Ok((owner, model))
        }
        _ => Err(LlmError::InvalidModelName(name.to_owned())),
    }
}
