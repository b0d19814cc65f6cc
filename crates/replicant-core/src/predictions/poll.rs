use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::{Prediction, PredictionClient, PredictionStatus};
use crate::error::{LlmError, LlmResult};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// How long to keep re-reading an unfinished prediction. With both bounds
/// unset the wait is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub max_attempts: Option<u32>,
    pub max_wait_sec: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: None,
            max_wait_sec: None,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_sec.map(Duration::from_secs)
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_wait().is_some_and(|max| elapsed >= max)
    }
}

/// Refetches `prediction` every `policy.interval()` until it reports a
/// terminal status. An unrecognized status ends the wait with
/// `UnexpectedOutput`. Dropping the future abandons the wait; the remote job
/// keeps running.
pub async fn wait_for_completion(
    client: &dyn PredictionClient,
    mut prediction: Prediction,
    policy: &PollPolicy,
) -> LlmResult<Prediction> {
    let started = Instant::now();
    let mut attempts = 0u32;

    while !prediction.is_finished() {
        if prediction.status == PredictionStatus::Unknown {
            warn!(
                prediction_id = %prediction.id,
                attempts,
                "prediction reported an unrecognized status"
            );
            return Err(LlmError::UnexpectedOutput(format!(
                "prediction {} reported an unrecognized status",
                prediction.id
            )));
        }

        let elapsed = started.elapsed();
        if policy.exhausted(attempts, elapsed) {
            warn!(
                prediction_id = %prediction.id,
                attempts,
                ?elapsed,
                "prediction poll limit reached"
            );
            return Err(LlmError::PollTimeout {
                id: prediction.id,
                attempts,
                elapsed,
            });
        }

        sleep(policy.interval()).await;
        prediction = client.get_prediction(&prediction.id).await?;
        attempts += 1;
        debug!(
            prediction_id = %prediction.id,
            status = %prediction.status,
            attempts,
            "polled prediction"
        );
    }

    Ok(prediction)
}
