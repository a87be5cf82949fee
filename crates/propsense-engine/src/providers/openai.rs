use std::env;

use anyhow::{bail, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::image::ImagePayload;
use crate::oracle::{classify_reqwest_error, ModelOracle, OracleConfig, OracleError};
use crate::providers::{non_empty_env, truncate_text};

/// OpenAI-compatible chat-completions oracle. JSON mode is always on; the
/// schema itself is enforced downstream, never trusted from here.
pub struct OpenAiOracle {
    api_base: String,
    api_key: String,
    http: HttpClient,
    config: OracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let Some(api_key) =
            non_empty_env("OPENAI_API_KEY").or_else(|| non_empty_env("OPENAI_API_KEY_BACKUP"))
        else {
            bail!("OPENAI_API_KEY or OPENAI_API_KEY_BACKUP not set");
        };
        Ok(Self {
            api_base: env::var("OPENAI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            http: HttpClient::new(),
            config,
        })
    }

    fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn complete(&self, messages: Vec<Value>) -> Result<String, OracleError> {
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
        });
        let endpoint = self.chat_endpoint();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .map_err(|err| classify_reqwest_error("OpenAI chat request failed", err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| classify_reqwest_error("OpenAI response body read failed", err))?;
        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            OracleError::Transport(format!("OpenAI returned an invalid JSON envelope: {err}"))
        })?;
        let content = parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|text| !text.trim().is_empty());
        content.ok_or_else(|| {
            OracleError::Transport(format!(
                "OpenAI response carried no message content: {}",
                truncate_text(&body, 512)
            ))
        })
    }
}

impl ModelOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    fn vision_completion(
        &self,
        system: &str,
        user: &str,
        image: &ImagePayload,
    ) -> Result<String, OracleError> {
        self.complete(vec![
            json!({"role": "system", "content": system}),
            json!({
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": image.data_url()}},
                    {"type": "text", "text": user},
                ],
            }),
        ])
    }

    fn text_completion(&self, system: &str, user: &str) -> Result<String, OracleError> {
        self.complete(vec![
            json!({"role": "system", "content": system}),
            json!({"role": "user", "content": user}),
        ])
    }
}
