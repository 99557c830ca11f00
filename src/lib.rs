//! mail-classify — LLM email classification with a concurrent dispatcher.

pub mod config;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod taxonomy;
