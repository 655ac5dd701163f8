//! LM invocation logging for run transparency.
//!
//! When enabled, every structured call appends one line to a JSONL file:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"schema":"question_list","attempts":1,"duration_ms":4200,"outcome":"success",...}
//! ```
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Current schema version for log entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

/// Preview length for the prompt stored alongside each entry.
const PROMPT_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the entry was finished.
    pub ts: u64,
    /// Name of the response schema requested.
    pub schema: String,
    /// Backend calls made, including retries.
    pub attempts: u32,
    pub duration_ms: u64,
    pub outcome: LmOutcome,
    pub prompt_bytes: usize,
    pub response_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing log entries with timing.
pub struct LmLogBuilder {
    start: Instant,
    schema: String,
    prompt_bytes: usize,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    pub fn new(schema: &str, prompt: &str) -> Self {
        Self {
            start: Instant::now(),
            schema: schema.to_string(),
            prompt_bytes: prompt.len(),
            prompt_preview: Some(crate::util::truncate_string(prompt, PROMPT_PREVIEW_BYTES)),
        }
    }

    pub fn success(self, attempts: u32, response_bytes: usize) -> LmLogEntry {
        self.build(LmOutcome::Success, attempts, response_bytes, None)
    }

    pub fn failed(self, attempts: u32, error: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Failed, attempts, 0, Some(error.into()))
    }

    fn build(
        self,
        outcome: LmOutcome,
        attempts: u32,
        response_bytes: usize,
        error: Option<String>,
    ) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            schema: self.schema,
            attempts,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            prompt_bytes: self.prompt_bytes,
            response_bytes,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only JSONL sink.
#[derive(Debug, Clone)]
pub struct LmLog {
    path: PathBuf,
}

impl LmLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &LmLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open lm log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize lm log entry")?;
        writeln!(file, "{line}").context("write lm log entry")?;
        Ok(())
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
