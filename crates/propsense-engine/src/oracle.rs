use std::time::Duration;

use propsense_contracts::failure::PipelineFailure;
use thiserror::Error;

use crate::image::ImagePayload;

/// How a single oracle call can fail before its text is even inspected.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call exceeded its deadline: {0}")]
    Timeout(String),
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle API returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl From<OracleError> for PipelineFailure {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout(detail) => PipelineFailure::timeout(detail),
            other => PipelineFailure::oracle_unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub model: String,
    pub timeout: Duration,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl OracleConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout: Duration::from_secs(60),
            temperature: 0.4,
            max_tokens: 2500,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An external model service treated as a black box: request in, raw text
/// out. Implementations perform exactly one call per method, with no
/// retries of their own.
pub trait ModelOracle: Send + Sync {
    fn name(&self) -> &str;

    fn vision_completion(
        &self,
        system: &str,
        user: &str,
        image: &ImagePayload,
    ) -> Result<String, OracleError>;

    fn text_completion(&self, system: &str, user: &str) -> Result<String, OracleError>;
}

pub(crate) fn classify_reqwest_error(context: &str, err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout(format!("{context}: {err}"))
    } else {
        OracleError::Transport(format!("{context}: {err}"))
    }
}
