//! OpenAI-compatible chat-completion and embedding clients.
//!
//! Both clients speak the `/v1`-style wire format so the agent runs
//! unchanged against a local Ollama daemon or a hosted endpoint; only
//! the configured base URL, model, and key differ.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use helpline_core::config::{EmbeddingConfig, OracleConfig};
use helpline_core::{Role, Turn};
use helpline_store::Embedder;

use crate::oracle::{CapabilitySpec, Oracle, OracleReply, ToolCall};

const SYSTEM_PROMPT: &str = "You are a helpful voice support agent for an online store. \
Use at most one tool per turn, and only when the user's request clearly matches the tool's \
description. Answer conversationally when no tool fits. Keep answers short (at most four \
sentences) and spoken-style.";

pub struct HttpOracle {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building oracle http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn chat(&self, body: &Value) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            let mut request = self.client.post(&url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key.expose_secret());
            }
            match request.send().await.and_then(|response| response.error_for_status()) {
                Ok(response) => {
                    return response.json::<ChatResponse>().await.context("decoding chat completion")
                }
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "chat completion attempt failed");
                    last_error = Some(anyhow::Error::from(error));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("chat completion failed with no attempts")))
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn plan(
        &self,
        history: &[Turn],
        capabilities: &[CapabilitySpec],
    ) -> Result<OracleReply> {
        let tools: Vec<Value> = capabilities.iter().map(capability_to_wire).collect();
        let body = json!({
            "model": self.model,
            "messages": messages_from_history(history),
            "tools": tools,
        });
        let response = self.chat(&body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion had no choices"))?;

        if let Some(wire) = choice.message.tool_calls.into_iter().next() {
            let arguments: Value = if wire.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&wire.function.arguments)
                    .context("parsing tool-call arguments")?
            };
            return Ok(OracleReply::Invoke(ToolCall { name: wire.function.name, arguments }));
        }
        Ok(OracleReply::Say(choice.message.content.unwrap_or_default()))
    }

    async fn narrate(&self, history: &[Turn], call: &ToolCall, tool_text: &str) -> Result<String> {
        let mut messages = messages_from_history(history);
        messages.push(json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.arguments.to_string(),
                }
            }]
        }));
        messages.push(json!({
            "role": "tool",
            "tool_call_id": "call_1",
            "content": tool_text,
        }));

        let body = json!({"model": self.model, "messages": messages});
        let response = self.chat(&body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty());
        Ok(content.unwrap_or_else(|| tool_text.to_string()))
    }
}

fn capability_to_wire(capability: &CapabilitySpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": capability.name,
            "description": capability.description,
            "parameters": capability.parameters,
        }
    })
}

fn messages_from_history(history: &[Turn]) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];
    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Agent => "assistant",
        };
        messages.push(json!({"role": role, "content": turn.text}));
    }
    messages
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building embedding http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request =
            self.client.post(&url).json(&json!({"model": self.model, "input": text}));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding endpoint returned an error status")?;
        let payload: EmbeddingResponse =
            response.json().await.context("decoding embedding response")?;
        payload
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| anyhow!("embedding response had no vectors"))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
