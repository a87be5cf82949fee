use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known oracle models, insertion-ordered so the first entry with a
/// capability is its default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// First registered model with the capability, if any.
    pub fn default_for(&self, capability: &str) -> Option<ModelSpec> {
        self.models
            .values()
            .find(|model| model.supports(capability))
            .cloned()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        self.get(name)
            .filter(|model| model.supports(capability))
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        if let Some(name) = requested {
            if let Some(model) = self.registry.ensure(name, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(name.to_string()),
                    fallback_reason: None,
                });
            }
        }

        let Some(model) = self.registry.default_for(capability) else {
            return Err(format!("no '{capability}'-capable model is registered"));
        };
        let fallback_reason = match requested {
            Some(name) => format!(
                "model '{name}' cannot do '{capability}'; falling back to '{}'",
                model.name
            ),
            None => format!("no model requested; defaulting to '{}'", model.name),
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("gpt-4o-mini", "openai", &["text", "vision"]);
    insert("gpt-4o", "openai", &["text", "vision"]);
    insert("gemini-2.5-flash", "gemini", &["text", "vision"]);
    insert("gemini-2.0-flash", "gemini", &["text", "vision"]);
    insert("dryrun-vlm-1", "dryrun", &["text", "vision"]);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vision_model(name: &str, provider: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: vec!["text".to_string(), "vision".to_string()],
        }
    }

    #[test]
    fn requested_model_with_capability_is_used_directly() {
        let selection = ModelSelector::new(None)
            .select(Some("gemini-2.5-flash"), "vision")
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert_eq!(selection.model.provider, "gemini");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn unknown_model_falls_back_to_first_capable_default() {
        let selection = ModelSelector::new(None)
            .select(Some("missing-model"), "vision")
            .unwrap();
        assert_eq!(selection.model.name, "gpt-4o-mini");
        assert_eq!(selection.requested.as_deref(), Some("missing-model"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("model 'missing-model' cannot do 'vision'; falling back to 'gpt-4o-mini'")
        );
    }

    #[test]
    fn no_request_uses_default_with_explanation() {
        let mut models = IndexMap::new();
        models.insert(
            "local-vlm".to_string(),
            vision_model("local-vlm", "dryrun"),
        );
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, "text")
            .unwrap();
        assert_eq!(selection.model.name, "local-vlm");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("no model requested; defaulting to 'local-vlm'")
        );
    }

    #[test]
    fn missing_capability_is_an_error() {
        let mut models = IndexMap::new();
        models.insert(
            "text-only".to_string(),
            ModelSpec {
                name: "text-only".to_string(),
                provider: "openai".to_string(),
                capabilities: vec!["text".to_string()],
            },
        );
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("text-only"), "vision")
            .unwrap_err();
        assert_eq!(err, "no 'vision'-capable model is registered");
    }
}
