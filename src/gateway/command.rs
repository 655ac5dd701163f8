//! Local LM command backend.
//!
//! Invokes a user-configured command with the rendered prompt on stdin and
//! reads the response from stdout. The command can be any tool that accepts
//! text and produces text (`llm`, `ollama run`, a wrapper script).
use super::{GenerationRequest, Generator};
use crate::util::truncate_bytes;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

const STDERR_EXCERPT_BYTES: usize = 2000;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
}

impl CommandGenerator {
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv })
    }
}

impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.argv[0]
    }

    fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = render_prompt(request)?;
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {}", self.argv[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write prompt to LM stdin")?;
        }

        let output = child.wait_with_output().context("wait for LM command")?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::debug!(
            elapsed_ms,
            schema = request.schema_name,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = truncate_bytes(&output.stderr, STDERR_EXCERPT_BYTES);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

/// Flatten a request into the single text document the command receives.
fn render_prompt(request: &GenerationRequest) -> Result<String> {
    let schema =
        serde_json::to_string_pretty(&request.schema).context("serialize response schema")?;
    Ok(format!(
        "# Instructions\n{system}\n\n# Task\n{user}\n\n# Response Format\nSchema: {name}\nTemperature: {temperature}\n\nRespond ONLY with a JSON object matching this JSON schema, no other text:\n```json\n{schema}\n```\n",
        system = request.system.trim(),
        user = request.user.trim(),
        name = request.schema_name,
        temperature = request.temperature,
    ))
}
