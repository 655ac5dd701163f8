//! Structured-call gateway in front of the language model.
//!
//! A [`Generator`] turns a request into raw model text. The
//! [`StructuredGateway`] wraps one with the structured-output contract:
//! extract JSON from the response, deserialize it into the declared type, run
//! the caller's shape check, and retry within a bounded budget.
//!
//! # Error Recovery
//!
//! 1. **Transient backend errors** (rate limits, timeouts, 5xx): sleep
//!    `delay * attempt`, then call again with the same prompt.
//! 2. **Shape mismatches** (bad JSON, failed check): call again with a repair
//!    prompt quoting the error and the previous response.
//! 3. **Other backend errors**: give up immediately.
//!
//! Every path out of the budget is a [`StageError::Generation`].
mod command;
mod http;
mod retry;

pub use command::CommandGenerator;
pub use http::{OpenAiConfig, OpenAiGenerator};
pub use retry::{is_transient, RetryPolicy};

use crate::config::{BackendKind, Settings};
use crate::error::StageError;
use crate::lm_log::{LmLog, LmLogBuilder, LmLogEntry};
use crate::prompts::RenderedPrompt;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Previous-response excerpt included in repair prompts.
const REPAIR_SNIPPET_BYTES: usize = 1000;

/// One call to the language model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub schema_name: &'static str,
    pub schema: Value,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Backend capable of answering a prompt with raw text.
pub trait Generator {
    /// Short label for logs.
    fn name(&self) -> &str;

    fn complete(&self, request: &GenerationRequest) -> Result<String>;
}

/// A value the model is asked to produce, with its declared JSON schema.
pub trait StructuredOutput: DeserializeOwned {
    const SCHEMA_NAME: &'static str;

    fn json_schema() -> Value;
}

pub struct StructuredGateway {
    generator: Box<dyn Generator>,
    policy: RetryPolicy,
    log: Option<LmLog>,
}

impl StructuredGateway {
    pub fn new(generator: Box<dyn Generator>, policy: RetryPolicy) -> Self {
        Self {
            generator,
            policy,
            log: None,
        }
    }

    pub fn with_log(mut self, log: LmLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Ask for a `T`, validating the deserialized value with `check`.
    pub fn invoke<T, F>(
        &self,
        prompt: &RenderedPrompt,
        temperature: f32,
        check: F,
    ) -> Result<T, StageError>
    where
        T: StructuredOutput,
        F: Fn(&T) -> Result<(), String>,
    {
        let base = GenerationRequest {
            schema_name: T::SCHEMA_NAME,
            schema: T::json_schema(),
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            temperature,
        };
        let log_entry = LmLogBuilder::new(T::SCHEMA_NAME, &prompt.user);

        let mut last_error = String::from("no attempts made");
        let mut repair: Option<(String, String)> = None;

        for attempt in 1..=self.policy.max_attempts {
            let request = match &repair {
                Some((error, previous)) => repair_request(&base, error, previous),
                None => base.clone(),
            };

            let raw = match self.generator.complete(&request) {
                Ok(raw) => raw,
                Err(err) => {
                    let message = format!("{err:#}");
                    if is_transient(&message) && self.policy.has_attempts_after(attempt) {
                        let wait = self.policy.backoff(attempt);
                        tracing::warn!(
                            schema = T::SCHEMA_NAME,
                            attempt,
                            max_attempts = self.policy.max_attempts,
                            wait_ms = wait.as_millis() as u64,
                            error = %message,
                            "transient LM error, retrying"
                        );
                        std::thread::sleep(wait);
                        last_error = message;
                        continue;
                    }
                    let transient = is_transient(&message);
                    self.record(log_entry.failed(attempt, &message));
                    return Err(StageError::generation(format!(
                        "LM call failed after {attempt} attempt(s): {message}"
                    ))
                    .with("schema", T::SCHEMA_NAME)
                    .with("attempts", attempt)
                    .with("transient", transient));
                }
            };

            match parse_structured::<T>(&raw).and_then(|value| check(&value).map(|()| value)) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(schema = T::SCHEMA_NAME, attempt, "LM retry succeeded");
                    }
                    self.record(log_entry.success(attempt, raw.len()));
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(
                        schema = T::SCHEMA_NAME,
                        attempt,
                        error = %error,
                        "LM response did not match schema"
                    );
                    last_error = error.clone();
                    repair = Some((error, raw));
                }
            }
        }

        let attempts = self.policy.max_attempts;
        self.record(log_entry.failed(attempts, &last_error));
        Err(StageError::generation(format!(
            "LM failed after {attempts} attempt(s). Last error: {last_error}"
        ))
        .with("schema", T::SCHEMA_NAME)
        .with("attempts", attempts))
    }

    fn record(&self, entry: LmLogEntry) {
        if let Some(log) = &self.log {
            if let Err(err) = log.append(&entry) {
                tracing::warn!(
                    path = %log.path().display(),
                    error = %format!("{err:#}"),
                    "lm log append failed"
                );
            }
        }
    }
}

/// Build the gateway described by `settings`.
pub fn build(settings: &Settings) -> Result<StructuredGateway> {
    let generator = generator_for(settings)
        .with_context(|| format!("configure LM backend {}", backend_label(settings)))?;
    tracing::debug!(backend = ?settings.backend, generator = generator.name(), "LM backend ready");
    let policy = RetryPolicy::new(
        settings.max_retries,
        Duration::from_millis(settings.retry_delay_ms),
    );
    let gateway = StructuredGateway::new(generator, policy);
    Ok(match &settings.lm_log {
        Some(path) => gateway.with_log(LmLog::new(path.clone())),
        None => gateway,
    })
}

fn generator_for(settings: &Settings) -> Result<Box<dyn Generator>> {
    let generator: Box<dyn Generator> = match settings.backend {
        BackendKind::Command => {
            let command = settings
                .lm_command
                .as_deref()
                .ok_or_else(|| anyhow!("command backend selected but no LM command configured"))?;
            Box::new(CommandGenerator::new(command)?)
        }
        BackendKind::Openai => {
            let api_key = settings
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("openai backend selected but OPENAI_API_KEY is not set"))?;
            Box::new(OpenAiGenerator::new(OpenAiConfig {
                api_base: settings.api_base.clone(),
                api_key,
                model: settings.model.clone(),
                timeout: Duration::from_secs(settings.request_timeout_secs),
            }))
        }
    };
    Ok(generator)
}

fn backend_label(settings: &Settings) -> String {
    match settings.backend {
        BackendKind::Command => format!(
            "command `{}`",
            settings.lm_command.as_deref().unwrap_or("<unset>")
        ),
        BackendKind::Openai => format!("openai model `{}`", settings.model),
    }
}

fn repair_request(base: &GenerationRequest, error: &str, previous: &str) -> GenerationRequest {
    let snippet = if previous.len() > REPAIR_SNIPPET_BYTES {
        format!(
            "{}...(truncated)",
            truncate_string(previous, REPAIR_SNIPPET_BYTES)
        )
    } else {
        previous.to_string()
    };
    let user = format!(
        "## Previous Response Error\n\nYour previous response could not be used. Fix the error and answer again.\n\n**Error:** {error}\n\n**Your previous response (may be truncated):**\n```\n{snippet}\n```\n\n## Original Task\n\n{task}\n\nRespond ONLY with the corrected JSON object, no other text.",
        task = base.user,
    );
    GenerationRequest {
        user,
        ..base.clone()
    }
}

/// Deserialize a raw model response into `T`.
fn parse_structured<T: StructuredOutput>(text: &str) -> Result<T, String> {
    let json_text = extract_json(text);
    if json_text.is_empty() {
        return Err("empty response".to_string());
    }
    serde_json::from_str::<T>(json_text).map_err(|e| {
        let line = e.line();
        let context = json_text
            .lines()
            .nth(line.saturating_sub(1))
            .map(|content| format!("line {line}: {}", truncate_string(content.trim(), 200)))
            .unwrap_or_else(|| format!("(line {line} not found)"));
        format!(
            "response does not match `{}`: {e}; near {context}",
            T::SCHEMA_NAME
        )
    })
}

/// Extract JSON from text that might have markdown code fences.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip language identifier if present
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    text
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
