use std::env;

use anyhow::{bail, Result};

use crate::oracle::{ModelOracle, OracleConfig};

pub mod dryrun;
pub mod gemini;
pub mod openai;

pub use dryrun::DryrunOracle;
pub use gemini::GeminiOracle;
pub use openai::OpenAiOracle;

/// Builds the oracle for a provider name from the model registry.
pub fn build_oracle(provider: &str, config: OracleConfig) -> Result<Box<dyn ModelOracle>> {
    match provider {
        "openai" => Ok(Box::new(OpenAiOracle::new(config)?)),
        "gemini" => Ok(Box::new(GeminiOracle::new(config)?)),
        "dryrun" => Ok(Box::new(DryrunOracle::new(config))),
        other => bail!("unknown oracle provider '{other}'"),
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
