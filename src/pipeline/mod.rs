//! Classification pipeline.
//!
//! Every batch flows through:
//! 1. `normalize::normalize()` — raw email body → plain text
//! 2. `PromptBuilder::build()` — fixed instruction template around the text
//! 3. `Dispatcher::run()` — one task per item, optional concurrency cap
//! 4. `RequestExecutor::execute()` — pacing, request, backoff, parse
//!
//! **No item is ever dropped.** Every failure is an outcome variant.

pub mod dispatcher;
pub mod executor;
pub mod normalize;
pub mod parser;
pub mod prompt;
pub mod types;

pub use dispatcher::Dispatcher;
pub use executor::RequestExecutor;
pub use prompt::PromptBuilder;
pub use types::{ClassificationItem, ClassificationOutcome, ItemOutcome, OutcomeSummary};
