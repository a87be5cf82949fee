use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Closed taxonomy of pipeline failures. `OracleUnavailable` covers
/// transport and API errors that are neither timeouts nor content problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ParseError,
    SchemaViolation,
    Timeout,
    EmptyInput,
    OracleUnavailable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::ParseError => "parse_error",
            FailureKind::SchemaViolation => "schema_violation",
            FailureKind::Timeout => "timeout",
            FailureKind::EmptyInput => "empty_input",
            FailureKind::OracleUnavailable => "oracle_unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {detail}")]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl PipelineFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Oracle output was not valid JSON. `raw` is kept verbatim so the
    /// caller can inspect what the model actually said.
    pub fn parse_error(raw: impl Into<String>) -> Self {
        Self::new(FailureKind::ParseError, raw)
    }

    pub fn schema_violation(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::SchemaViolation, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    pub fn empty_input(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::EmptyInput, detail)
    }

    pub fn oracle_unavailable(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::OracleUnavailable, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_detail() {
        let failure = PipelineFailure::parse_error("not json at all");
        assert_eq!(failure.to_string(), "parse_error: not json at all");
        assert_eq!(failure.kind, FailureKind::ParseError);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_value(FailureKind::SchemaViolation).unwrap();
        assert_eq!(json, serde_json::json!("schema_violation"));
    }
}
