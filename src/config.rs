//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Classifier configuration.
///
/// Passed explicitly into the transport, executor and dispatcher; nothing in
/// the library reads the environment on its own.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Model identifier, e.g. `gemini-1.5-flash-latest`.
    pub model: String,
    /// API credential.
    pub api_key: SecretString,
    /// API root the endpoint path is appended to.
    pub base_url: String,
    /// Attempts per item, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles on every further attempt.
    pub base_backoff: Duration,
    /// Upper bound of the random jitter added to each backoff.
    pub max_jitter: Duration,
    /// Longest single wait between attempts, including server `Retry-After`
    /// hints.
    pub max_retry_wait: Duration,
    /// Lower bound of the randomized pre-request pacing delay.
    pub pacing_min: Duration,
    /// Upper bound of the randomized pre-request pacing delay.
    pub pacing_max: Duration,
    /// Cap on simultaneously in-flight items. `None` runs every item at once.
    pub max_concurrency: Option<usize>,
    /// Timeout for a single HTTP call.
    pub request_timeout: Duration,
    /// Reject replies whose labels fall outside the taxonomy.
    pub validate_labels: bool,
}

impl ClassifierConfig {
    /// Build a configuration with default tuning for the given model and key.
    pub fn new(model: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
            max_retry_wait: Duration::from_secs(60),
            pacing_min: Duration::from_millis(500),
            pacing_max: Duration::from_secs(2),
            max_concurrency: None,
            request_timeout: Duration::from_secs(60),
            validate_labels: false,
        }
    }

    /// Build config from environment variables.
    ///
    /// `GEMINI_API_KEY` is required; everything else falls back to the
    /// defaults of [`ClassifierConfig::new`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model =
            std::env::var("MAIL_CLASSIFY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut config = Self::new(model, SecretString::from(api_key));

        if let Ok(url) = std::env::var("MAIL_CLASSIFY_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(attempts) = env_parse::<u32>("MAIL_CLASSIFY_MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }
        if let Some(ms) = env_parse::<u64>("MAIL_CLASSIFY_BACKOFF_MS")? {
            config.base_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("MAIL_CLASSIFY_MAX_RETRY_WAIT_SECS")? {
            config.max_retry_wait = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>("MAIL_CLASSIFY_PACING_MIN_MS")? {
            config.pacing_min = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("MAIL_CLASSIFY_PACING_MAX_MS")? {
            config.pacing_max = Duration::from_millis(ms);
        }
        config.max_concurrency = env_parse::<usize>("MAIL_CLASSIFY_MAX_CONCURRENCY")?;
        if let Some(secs) = env_parse::<u64>("MAIL_CLASSIFY_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(validate) = env_parse::<bool>("MAIL_CLASSIFY_VALIDATE_LABELS")? {
            config.validate_labels = validate;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the numeric settings for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pacing_min > self.pacing_max {
            return Err(ConfigError::InvalidValue {
                key: "pacing".to_string(),
                message: format!(
                    "min {:?} is greater than max {:?}",
                    self.pacing_min, self.pacing_max
                ),
            });
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrency".to_string(),
                message: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Disable pacing and backoff delays. Used by tests and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.base_backoff = Duration::ZERO;
        self.max_jitter = Duration::ZERO;
        self.pacing_min = Duration::ZERO;
        self.pacing_max = Duration::ZERO;
        self
    }
}

/// Parse an optional environment variable, rejecting malformed values.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
