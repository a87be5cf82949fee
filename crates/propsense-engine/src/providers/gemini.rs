use std::env;

use anyhow::{bail, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::image::ImagePayload;
use crate::oracle::{classify_reqwest_error, ModelOracle, OracleConfig, OracleError};
use crate::providers::{non_empty_env, truncate_text};

pub struct GeminiOracle {
    api_base: String,
    api_key: String,
    http: HttpClient,
    config: OracleConfig,
}

impl GeminiOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let Some(api_key) =
            non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
        else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        Ok(Self {
            api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            api_key,
            http: HttpClient::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        let model = self.config.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn generate(&self, parts: Vec<Value>) -> Result<String, OracleError> {
        let payload = json!({
            "contents": [{"parts": parts}],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
                "responseMimeType": "application/json",
            },
        });
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .map_err(|err| classify_reqwest_error("Gemini generate request failed", err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| classify_reqwest_error("Gemini response body read failed", err))?;
        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            OracleError::Transport(format!("Gemini returned an invalid JSON envelope: {err}"))
        })?;
        let text = Self::collect_text_parts(&parsed);
        if text.trim().is_empty() {
            return Err(OracleError::Transport(format!(
                "Gemini response carried no text parts: {}",
                truncate_text(&body, 512)
            )));
        }
        Ok(text)
    }

    fn collect_text_parts(response_payload: &Value) -> String {
        let parts = response_payload
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut out = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        out
    }
}

impl ModelOracle for GeminiOracle {
    fn name(&self) -> &str {
        "gemini"
    }

    fn vision_completion(
        &self,
        system: &str,
        user: &str,
        image: &ImagePayload,
    ) -> Result<String, OracleError> {
        self.generate(vec![
            json!({"text": format!("{system}\n\n{user}")}),
            json!({"inline_data": {"mime_type": image.mime_type(), "data": image.base64()}}),
        ])
    }

    fn text_completion(&self, system: &str, user: &str) -> Result<String, OracleError> {
        self.generate(vec![json!({"text": format!("{system}\n\n{user}")})])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collects_text_across_candidate_parts() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}
            }]
        });
        assert_eq!(GeminiOracle::collect_text_parts(&payload), "{\"a\":1}");
    }

    #[test]
    fn missing_candidates_yield_empty_text() {
        assert_eq!(GeminiOracle::collect_text_parts(&json!({})), "");
    }
}
