//! Error types for mail-classify.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from a single request to the model service.
///
/// These never escape the dispatcher: the request executor folds every one of
/// them into a `ClassificationOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} returned status {status}: {body}")]
    Service {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidResponse { .. })
    }
}

/// Batch source / result sink errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Record count mismatch: {records} records, {outcomes} outcomes")]
    LengthMismatch { records: usize, outcomes: usize },
}

/// Evaluation / timeline report errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No overlapping records between predictions and ground truth")]
    NoOverlap,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_response_is_not_retryable() {
        let err = LlmError::InvalidResponse {
            provider: "gemini".into(),
            reason: "no candidates".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_and_status_errors_are_retryable() {
        let transport = LlmError::Transport {
            provider: "gemini".into(),
            reason: "connection reset".into(),
        };
        let limited = LlmError::RateLimited {
            provider: "gemini".into(),
            retry_after: None,
        };
        let service = LlmError::Service {
            provider: "gemini".into(),
            status: 503,
            body: "unavailable".into(),
        };
        assert!(transport.is_retryable());
        assert!(limited.is_retryable());
        assert!(service.is_retryable());
    }

    #[test]
    fn config_error_converts_into_top_level() {
        let err: Error = ConfigError::MissingEnvVar("GEMINI_API_KEY".into()).into();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn dataset_and_report_errors_convert_into_top_level() {
        fn fail_dataset() -> Result<()> {
            let joined: std::result::Result<(), DatasetError> =
                Err(DatasetError::LengthMismatch {
                    records: 2,
                    outcomes: 1,
                });
            joined?;
            Ok(())
        }
        fn fail_report() -> Result<()> {
            let scored: std::result::Result<(), ReportError> = Err(ReportError::NoOverlap);
            scored?;
            Ok(())
        }

        let err = fail_dataset().unwrap_err();
        assert!(matches!(err, Error::Dataset(DatasetError::LengthMismatch { .. })));
        assert!(err.to_string().starts_with("Dataset error: Record count mismatch"));

        let err = fail_report().unwrap_err();
        assert!(matches!(err, Error::Report(ReportError::NoOverlap)));
        assert!(err.to_string().starts_with("Report error:"));
    }
}
