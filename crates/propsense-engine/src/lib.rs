use propsense_contracts::decision::GroundingDecision;
use propsense_contracts::events::{EventPayload, InvocationLog};
use propsense_contracts::failure::PipelineFailure;
use propsense_contracts::objects::ObjectRegistry;
use propsense_contracts::result::PipelineResult;
use serde_json::{json, Value};

pub mod image;
pub mod oracle;
pub mod prompts;
pub mod providers;

pub use image::ImagePayload;
pub use oracle::{ModelOracle, OracleConfig, OracleError};

use prompts::{
    grounding_user_prompt, GROUNDING_SYSTEM, PERCEPTION_INSTRUCTIONS, PERCEPTION_SYSTEM,
    PROMPT_VERSION,
};

/// One perception → grounding pipeline bound to a single oracle.
///
/// Each invocation is sequential and self-contained: `perceive` produces a
/// registry, `ground` consumes it. A clarification follow-up is a fresh
/// `ground` call against the same registry with the refined query.
pub struct Pipeline {
    oracle: Box<dyn ModelOracle>,
    log: Option<InvocationLog>,
}

impl Pipeline {
    pub fn new(oracle: Box<dyn ModelOracle>) -> Self {
        Self { oracle, log: None }
    }

    pub fn with_log(mut self, log: InvocationLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Runs the vision oracle once over `image_bytes` and validates its
    /// output into a registry. An empty registry is a legitimate outcome;
    /// unparseable output is not.
    pub fn perceive(&self, image_bytes: &[u8]) -> Result<ObjectRegistry, PipelineFailure> {
        let image = ImagePayload::from_bytes(image_bytes.to_vec())
            .map_err(|failure| self.stage_failed("perception", failure))?;
        let raw = self
            .oracle
            .vision_completion(PERCEPTION_SYSTEM, PERCEPTION_INSTRUCTIONS, &image)
            .map_err(|err| self.stage_failed("perception", err.into()))?;
        let registry = parse_object_registry(&raw)
            .map_err(|failure| self.stage_failed("perception", failure))?;

        let mut payload = EventPayload::new();
        payload.insert("oracle".to_string(), json!(self.oracle.name()));
        payload.insert("prompt_version".to_string(), json!(PROMPT_VERSION));
        payload.insert("objects".to_string(), json!(registry.len()));
        payload.insert("dropped".to_string(), json!(registry.dropped()));
        payload.insert("warnings".to_string(), json!(registry.drop_reasons()));
        self.record("perception_completed", payload);

        Ok(registry)
    }

    /// Runs the text oracle once with the registry and query embedded in
    /// its prompt, then validates the decision against that same registry.
    /// Inconsistent or dangling decisions become failures, never repairs.
    pub fn ground(&self, registry: &ObjectRegistry, query: &str) -> PipelineResult {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return self
                .stage_failed("grounding", PipelineFailure::empty_input("query is empty"))
                .into();
        }

        let prompt = grounding_user_prompt(&registry.to_prompt_json(), trimmed);
        let raw = match self.oracle.text_completion(GROUNDING_SYSTEM, &prompt) {
            Ok(raw) => raw,
            Err(err) => return self.stage_failed("grounding", err.into()).into(),
        };
        let decision = match parse_grounding_decision(&raw, registry) {
            Ok(decision) => decision,
            Err(failure) => return self.stage_failed("grounding", failure).into(),
        };

        let result = PipelineResult::resolve(decision);
        let mut payload = EventPayload::new();
        payload.insert("oracle".to_string(), json!(self.oracle.name()));
        payload.insert(
            "outcome".to_string(),
            json!(match &result {
                PipelineResult::Action { .. } => "action",
                PipelineResult::Clarification { .. } => "clarification",
                PipelineResult::Failure { .. } => "failure",
            }),
        );
        self.record("grounding_completed", payload);
        result
    }

    /// Full invocation: perception feeds grounding.
    pub fn run(&self, image_bytes: &[u8], query: &str) -> PipelineResult {
        match self.perceive(image_bytes) {
            Ok(registry) => self.ground(&registry, query),
            Err(failure) => failure.into(),
        }
    }

    fn stage_failed(&self, stage: &str, failure: PipelineFailure) -> PipelineFailure {
        let mut payload = EventPayload::new();
        payload.insert("stage".to_string(), json!(stage));
        payload.insert("kind".to_string(), json!(failure.kind));
        payload.insert("detail".to_string(), json!(failure.detail));
        self.record("stage_failed", payload);
        failure
    }

    // Observability must never take the pipeline down with it.
    fn record(&self, event: &str, payload: EventPayload) {
        if let Some(log) = &self.log {
            let _ = log.record(event, payload);
        }
    }
}

/// Parses one raw perception response. Invalid JSON keeps the raw text in
/// the failure detail; a JSON value without an `objects` array is a schema
/// violation; `notes` defaults to empty when absent.
pub fn parse_object_registry(raw: &str) -> Result<ObjectRegistry, PipelineFailure> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| PipelineFailure::parse_error(raw))?;
    let Some(top) = value.as_object() else {
        return Err(PipelineFailure::schema_violation(
            "perception output is not a JSON object",
        ));
    };
    let Some(raw_objects) = top.get("objects").and_then(Value::as_array) else {
        return Err(PipelineFailure::schema_violation(
            "perception output is missing the 'objects' array",
        ));
    };
    let notes = top
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(ObjectRegistry::from_raw_parts(raw_objects.clone(), notes))
}

/// Parses one raw grounding response and validates it against the registry
/// it was produced from.
pub fn parse_grounding_decision(
    raw: &str,
    registry: &ObjectRegistry,
) -> Result<GroundingDecision, PipelineFailure> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| PipelineFailure::parse_error(raw))?;
    let decision: GroundingDecision = serde_json::from_value(value).map_err(|err| {
        PipelineFailure::schema_violation(format!("decision does not match the schema: {err}"))
    })?;
    decision.validate(registry)?;
    Ok(decision)
}
