//! OpenAI-compatible chat-completions backend.
use super::{GenerationRequest, Generator};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct OpenAiGenerator {
    agent: ureq::Agent,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { agent, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name,
                    schema: &request.schema,
                    strict: false,
                },
            },
        };

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.config.api_key))
            .send_json(&body)
            .map_err(|err| anyhow!("chat completion request failed: {err}"))?;
        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .context("decode chat completion response")?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            schema = request.schema_name,
            model = %self.config.model,
            "chat completion complete"
        );

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        if let Some(refusal) = message.refusal.filter(|text| !text.trim().is_empty()) {
            return Err(anyhow!("model refused the request: {refusal}"));
        }
        message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion returned empty content"))
    }
}
