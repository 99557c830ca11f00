//! Request executor: drives one item from prompt to terminal outcome.
//!
//! Per attempt:
//! 1. Pacing delay (randomized, always)
//! 2. One transport call
//! 3. Success → parse → `Classified` or `ParseError` (final either way)
//! 4. Rate limit / transport / status error → backoff and go again, or
//!    convert into `RetryExhausted` / `ApiError` on the last attempt

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::LlmError;
use crate::llm::CompletionTransport;
use crate::llm::retry::{backoff_delay, pacing_delay};
use crate::pipeline::parser;
use crate::pipeline::types::ClassificationOutcome;
use crate::taxonomy::Taxonomy;

/// Timing knobs the executor needs from [`ClassifierConfig`].
#[derive(Debug, Clone)]
struct RetryPolicy {
    base_backoff: Duration,
    max_jitter: Duration,
    max_wait: Duration,
    pacing_min: Duration,
    pacing_max: Duration,
}

/// Executes classification requests against a shared transport.
pub struct RequestExecutor {
    transport: Arc<dyn CompletionTransport>,
    policy: RetryPolicy,
    max_attempts: u32,
    taxonomy: Option<Arc<Taxonomy>>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn CompletionTransport>, config: &ClassifierConfig) -> Self {
        Self {
            transport,
            policy: RetryPolicy {
                base_backoff: config.base_backoff,
                max_jitter: config.max_jitter,
                max_wait: config.max_retry_wait,
                pacing_min: config.pacing_min,
                pacing_max: config.pacing_max,
            },
            max_attempts: config.max_attempts,
            taxonomy: None,
        }
    }

    /// Reject replies whose label is outside `taxonomy` as `ParseError`.
    pub fn with_validation(mut self, taxonomy: Arc<Taxonomy>) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    /// Attempt budget configured at construction.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `prompt` to a terminal outcome using at most `max_attempts` calls.
    /// A budget of 0 is treated as 1.
    pub async fn execute(&self, id: usize, prompt: &str, max_attempts: u32) -> ClassificationOutcome {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let pacing = pacing_delay(self.policy.pacing_min, self.policy.pacing_max);
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }

            let err = match self.transport.generate(prompt).await {
                Ok(raw) => return self.interpret(id, attempt, &raw),
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(id, attempt, error = %err, "Malformed model response");
                return ClassificationOutcome::ParseError;
            }

            if attempt >= max_attempts {
                warn!(id, attempt, error = %err, "Attempts exhausted");
                return terminal_outcome(&err);
            }

            let mut delay =
                backoff_delay(self.policy.base_backoff, attempt, self.policy.max_jitter);
            if let LlmError::RateLimited {
                retry_after: Some(hint),
                ..
            } = &err
            {
                delay = delay.max(*hint);
            }
            let delay = delay.min(self.policy.max_wait);

            debug!(
                id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Turn a successful reply into a final outcome. Parse failures are not
    /// retried.
    fn interpret(&self, id: usize, attempt: u32, raw: &str) -> ClassificationOutcome {
        let label = match parser::parse(raw) {
            Ok(label) => label,
            Err(signal) => {
                let preview: String = raw.chars().take(200).collect();
                warn!(id, attempt, reason = %signal, raw = %preview, "Unparsable reply");
                return ClassificationOutcome::ParseError;
            }
        };

        if let Some(taxonomy) = &self.taxonomy
            && let Err(violation) = taxonomy.validate(&label.main_category, &label.sub_category)
        {
            warn!(id, attempt, reason = %violation, "Label outside taxonomy");
            return ClassificationOutcome::ParseError;
        }

        debug!(
            id,
            attempt,
            main = %label.main_category,
            sub = %label.sub_category,
            "Classified"
        );
        ClassificationOutcome::Classified {
            main_category: label.main_category,
            sub_category: label.sub_category,
        }
    }
}

/// Outcome for a retryable error on the last attempt.
fn terminal_outcome(err: &LlmError) -> ClassificationOutcome {
    match err {
        LlmError::RateLimited { .. } => ClassificationOutcome::RetryExhausted,
        LlmError::Service { status, .. } => ClassificationOutcome::ApiError {
            status_code: Some(*status),
        },
        LlmError::Transport { .. } | LlmError::InvalidResponse { .. } => {
            ClassificationOutcome::ApiError { status_code: None }
        }
    }
}
