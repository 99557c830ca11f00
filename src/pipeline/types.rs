//! Shared types for the classification pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Input ───────────────────────────────────────────────────────────

/// One unit of work: normalized text plus its index in the original batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationItem {
    /// Position in the caller's batch. Carried end to end so results can be
    /// placed back without relying on completion order.
    pub id: usize,
    /// Normalized message text.
    pub text: String,
}

impl ClassificationItem {
    pub fn new(id: usize, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Number texts in iteration order.
    pub fn batch<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| Self::new(id, text))
            .collect()
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Terminal result for one item. Every failure mode is a variant; nothing is
/// ever represented by a missing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    /// The model answered with a parsable label pair.
    Classified {
        main_category: String,
        sub_category: String,
    },
    /// The model answered, but no usable JSON object was in the reply.
    ParseError,
    /// Non-success status (`Some`) or transport failure (`None`) on the last
    /// attempt.
    ApiError { status_code: Option<u16> },
    /// Every attempt was rate limited.
    #[serde(rename = "retry_failed")]
    RetryExhausted,
}

impl ClassificationOutcome {
    pub fn classified(main: impl Into<String>, sub: impl Into<String>) -> Self {
        Self::Classified {
            main_category: main.into(),
            sub_category: sub.into(),
        }
    }

    /// Short label for logging and output files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Classified { .. } => "classified",
            Self::ParseError => "parse_error",
            Self::ApiError { .. } => "api_error",
            Self::RetryExhausted => "retry_failed",
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }

    /// `(main, sub)` as written to the predictions file. Failures carry their
    /// outcome label in both columns so a re-run can select them.
    pub fn prediction(&self) -> (&str, &str) {
        match self {
            Self::Classified {
                main_category,
                sub_category,
            } => (main_category.as_str(), sub_category.as_str()),
            other => (other.label(), other.label()),
        }
    }
}

/// Outcome labels that mark a row as "needs re-run" rather than a prediction.
pub const FAILURE_LABELS: &[&str] = &["api_error", "parse_error", "retry_failed"];

/// An outcome tagged with the id of the item it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub id: usize,
    #[serde(flatten)]
    pub outcome: ClassificationOutcome,
}

// ── Summary ─────────────────────────────────────────────────────────

/// Counts per outcome label for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub total: usize,
    pub by_label: BTreeMap<&'static str, usize>,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[ItemOutcome]) -> Self {
        let mut by_label = BTreeMap::new();
        for o in outcomes {
            *by_label.entry(o.outcome.label()).or_insert(0) += 1;
        }
        Self {
            total: outcomes.len(),
            by_label,
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.by_label.get(label).copied().unwrap_or(0)
    }

    /// Rows that did not end in `classified`.
    pub fn failed(&self) -> usize {
        self.total - self.count("classified")
    }
}
