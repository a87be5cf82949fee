use serde::{Deserialize, Serialize};

use crate::failure::PipelineFailure;
use crate::objects::ObjectRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PickAndPlace,
    HandOver,
    PointAt,
    Clarify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    ToUser,
    Cart,
    LeftSide,
    RightSide,
    Stay,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub reason: String,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default)]
    pub target_object_id: Option<String>,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Safety {
    pub need_clarification: bool,
    #[serde(default)]
    pub message_if_any: Option<String>,
}

/// One grounding oracle response, deserialized but not yet trusted.
/// `validate` is the gate every decision passes before anything acts on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingDecision {
    pub selection: Selection,
    pub action: ActionSpec,
    pub safety: Safety,
    pub spoken_reply: String,
}

impl GroundingDecision {
    /// Cross-field invariants, checked against the registry the decision
    /// was produced from:
    /// - `need_clarification` holds exactly when the action is `clarify`
    /// - a non-clarify decision must name a target that exists in the
    ///   registry; a dangling or missing id is rejected, never repaired
    /// - an empty registry can never yield a target id
    /// - `spoken_reply` must carry text
    pub fn validate(&self, registry: &ObjectRegistry) -> Result<(), PipelineFailure> {
        let clarifying = self.safety.need_clarification;
        if clarifying != (self.action.kind == ActionType::Clarify) {
            return Err(PipelineFailure::schema_violation(format!(
                "need_clarification={} does not match action type {:?}",
                clarifying, self.action.kind
            )));
        }

        if let Some(target) = self.action.target_object_id.as_deref() {
            if registry.is_empty() {
                return Err(PipelineFailure::schema_violation(format!(
                    "decision targets '{target}' but the registry is empty"
                )));
            }
            if !registry.contains(target) {
                return Err(PipelineFailure::schema_violation(format!(
                    "target_object_id '{target}' is not present in the registry"
                )));
            }
        } else if !clarifying {
            return Err(PipelineFailure::schema_violation(
                "non-clarify decision is missing target_object_id",
            ));
        }

        if self.spoken_reply.trim().is_empty() {
            return Err(PipelineFailure::schema_violation("spoken_reply is empty"));
        }

        Ok(())
    }
}
