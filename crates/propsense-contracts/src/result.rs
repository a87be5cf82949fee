use serde::Serialize;

use crate::decision::GroundingDecision;
use crate::failure::{FailureKind, PipelineFailure};

/// What a clarification carries when the oracle left `message_if_any`
/// blank: a clarification must always have text to relay.
pub const FALLBACK_CLARIFYING_PROMPT: &str =
    "Could you say more about which object you mean, for example its color or position?";

/// Outward-facing outcome of one grounding call. A failure is always
/// surfaced as such; the pipeline never substitutes a guessed action for
/// intent it could not parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineResult {
    Action { decision: GroundingDecision },
    Clarification { message: String },
    Failure { kind: FailureKind, detail: String },
}

impl PipelineResult {
    /// Resolves a decision that already passed `GroundingDecision::validate`.
    pub fn resolve(decision: GroundingDecision) -> Self {
        if decision.safety.need_clarification {
            let message = decision
                .safety
                .message_if_any
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .unwrap_or(FALLBACK_CLARIFYING_PROMPT)
                .to_string();
            return PipelineResult::Clarification { message };
        }
        PipelineResult::Action { decision }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineResult::Failure { .. })
    }

    /// The line a robot would speak for this outcome, if any.
    pub fn spoken_text(&self) -> Option<&str> {
        match self {
            PipelineResult::Action { decision } => Some(decision.spoken_reply.as_str()),
            PipelineResult::Clarification { message } => Some(message.as_str()),
            PipelineResult::Failure { .. } => None,
        }
    }
}

impl From<PipelineFailure> for PipelineResult {
    fn from(failure: PipelineFailure) -> Self {
        PipelineResult::Failure {
            kind: failure.kind,
            detail: failure.detail,
        }
    }
}
