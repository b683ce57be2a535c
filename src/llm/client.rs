// src/llm/client.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{Provider, ProviderConfig};
use crate::error::{Error, Result};
use crate::llm::backend::{Completion, ResponseSchema};
use crate::llm::prompt::LlmPrompt;

const PROMPT_ABI_VERSION: &str = "v1-hypothesis-review";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct LlmClient {
    cfg: ProviderConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(cfg: ProviderConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "no API key configured for {:?}",
                cfg.provider
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self { cfg, http })
    }

    /// Execute one LLM request and return the completion text.
    pub async fn run(&self, prompt: &LlmPrompt, schema: Option<&ResponseSchema>) -> Result<String> {
        let prompt_hash = hash_prompt(prompt);
        let (url, headers, body) = build_request(&self.cfg, prompt, schema);

        debug!(model = %self.cfg.model, prompt = %&prompt_hash[..12], "sending request");

        let mut req = self.http.post(url).json(&body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        let json: Value = resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Llm(format!("LLM error {}: {}", status, json)));
        }

        let text = extract_text(self.cfg.provider, &json)?;
        debug!(prompt = %&prompt_hash[..12], chars = text.len(), "received completion");

        Ok(text)
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, prompt: &LlmPrompt, schema: Option<&ResponseSchema>) -> Result<String> {
        self.run(prompt, schema).await
    }
}

fn hash_prompt(prompt: &LlmPrompt) -> String {
    let mut h = Sha256::new();
    h.update(PROMPT_ABI_VERSION.as_bytes());
    h.update(prompt.system.as_bytes());
    h.update(prompt.user.as_bytes());
    hex::encode(h.finalize())
}

fn build_request(
    cfg: &ProviderConfig,
    prompt: &LlmPrompt,
    schema: Option<&ResponseSchema>,
) -> (String, Vec<(&'static str, String)>, Value) {
    match cfg.provider {
        Provider::OpenAI => {
            let url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/responses".into());

            let mut body = json!({
                "model": cfg.model,
                "instructions": prompt.system,
                "input": prompt.user,
                "max_output_tokens": cfg.max_tokens,
            });

            if let Some(s) = schema {
                body["text"] = json!({
                    "format": {
                        "type": "json_schema",
                        "name": s.name,
                        "schema": s.schema,
                        "strict": true,
                    }
                });
            }

            (
                url,
                vec![("Authorization", format!("Bearer {}", cfg.api_key))],
                body,
            )
        }

        Provider::Anthropic => {
            let url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".into());

            let system = match schema {
                Some(s) => format!(
                    "{}\n\nRespond with a single JSON object matching this schema and nothing else:\n{}",
                    prompt.system, s.schema
                ),
                None => prompt.system.clone(),
            };

            let body = json!({
                "model": cfg.model,
                "max_tokens": cfg.max_tokens,
                "system": system,
                "messages": [
                    { "role": "user", "content": prompt.user }
                ]
            });

            (
                url,
                vec![
                    ("x-api-key", cfg.api_key.clone()),
                    ("anthropic-version", ANTHROPIC_VERSION.into()),
                ],
                body,
            )
        }
    }
}

fn extract_text(provider: Provider, v: &Value) -> Result<String> {
    match provider {
        Provider::OpenAI => v
            .get("output")
            .and_then(|o| o.as_array())
            .and_then(|arr| {
                arr.iter().find_map(|item| {
                    item.get("content")?
                        .as_array()?
                        .iter()
                        .find_map(|c| c.get("text")?.as_str())
                })
            })
            .map(str::to_owned)
            .ok_or_else(|| Error::Llm("OpenAI response parse failure".into())),

        Provider::Anthropic => v
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| {
                arr.iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .and_then(|b| b.get("text")?.as_str())
            })
            .map(str::to_owned)
            .ok_or_else(|| Error::Llm("Anthropic response parse failure".into())),
    }
}
