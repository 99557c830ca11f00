//! Dispatcher: fans a batch out to concurrent request executors and
//! reassembles the outcomes in input order.
//!
//! **Core invariant: N items in, N outcomes out.** Each item runs in its own
//! tokio task; whatever happens inside that task (including a panic) ends up
//! as that item's outcome and never touches any other item.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::ClassifierConfig;
use crate::llm::CompletionTransport;
use crate::pipeline::executor::RequestExecutor;
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::types::{ClassificationItem, ClassificationOutcome, ItemOutcome};
use crate::taxonomy::Taxonomy;

/// Runs classification batches.
pub struct Dispatcher {
    executor: Arc<RequestExecutor>,
    prompts: PromptBuilder,
    max_concurrency: Option<usize>,
}

impl Dispatcher {
    pub fn new(
        executor: RequestExecutor,
        prompts: PromptBuilder,
        max_concurrency: Option<usize>,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            prompts,
            max_concurrency,
        }
    }

    /// Wire up executor, prompt and cap from one configuration.
    pub fn from_config(
        transport: Arc<dyn CompletionTransport>,
        taxonomy: Arc<Taxonomy>,
        config: &ClassifierConfig,
    ) -> Self {
        let mut executor = RequestExecutor::new(transport, config);
        if config.validate_labels {
            executor = executor.with_validation(Arc::clone(&taxonomy));
        }
        Self::new(
            executor,
            PromptBuilder::new(&taxonomy),
            config.max_concurrency,
        )
    }

    /// Classify every item. Returns once all items are terminal, one outcome
    /// per input, in input order.
    pub async fn run(&self, items: Vec<ClassificationItem>) -> Vec<ItemOutcome> {
        let run_id = Uuid::new_v4();
        let count = items.len();
        info!(%run_id, count, max_concurrency = ?self.max_concurrency, "Dispatching batch");

        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let max_attempts = self.executor.max_attempts();
        let ids: Vec<usize> = items.iter().map(|item| item.id).collect();

        let mut tasks = JoinSet::new();
        for (slot, item) in items.into_iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let limiter = limiter.clone();
            let prompt = self.prompts.build(&item.text);
            let id = item.id;
            let span = info_span!("classify", %run_id, id);

            tasks.spawn(
                async move {
                    let _permit = match limiter {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    let outcome = AssertUnwindSafe(executor.execute(id, &prompt, max_attempts))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!(id, "Classification task panicked");
                            ClassificationOutcome::ApiError { status_code: None }
                        });
                    (slot, outcome)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<ClassificationOutcome>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => slots[slot] = Some(outcome),
                Err(e) => error!(%run_id, error = %e, "Classification task failed to join"),
            }
        }

        let outcomes: Vec<ItemOutcome> = slots
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| ItemOutcome {
                id,
                outcome: outcome.unwrap_or(ClassificationOutcome::ApiError { status_code: None }),
            })
            .collect();

        let classified = outcomes.iter().filter(|o| o.outcome.is_classified()).count();
        info!(
            %run_id,
            classified,
            failed = count - classified,
            total = count,
            "Batch complete"
        );
        outcomes
    }
}
