//! Run settings.
//!
//! Settings are built once at startup and passed by reference. Sources, lowest
//! precedence first: built-in defaults, a JSON config file, the environment,
//! then CLI flags.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_INPUT_PATH: &str = "data/product_data.json";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const LOCAL_CONFIG_FILE: &str = "pforge.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local command reading the prompt on stdin.
    Command,
    /// OpenAI-compatible chat completions over HTTP.
    Openai,
}

/// Size limits applied to generated content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Minimum questions the question stage must produce.
    pub min_questions: usize,
    /// Minimum Q&A pairs on the FAQ page.
    pub min_faq_pairs: usize,
    /// Questions handed to the FAQ stage.
    pub faq_question_limit: usize,
    pub max_tagline_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_questions: 15,
            min_faq_pairs: 5,
            faq_question_limit: 7,
            max_tagline_chars: 150,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendKind,
    pub lm_command: Option<String>,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub competitor_temperature: f32,
    /// Total attempts per structured call.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub prompts_dir: Option<PathBuf>,
    pub lm_log: Option<PathBuf>,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Openai,
            lm_command: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            temperature: 0.7,
            competitor_temperature: 0.8,
            max_retries: 3,
            retry_delay_ms: 1000,
            request_timeout_secs: 120,
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            prompts_dir: None,
            lm_log: None,
            thresholds: Thresholds::default(),
        }
    }
}

/// On-disk config. Secrets are only read from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    backend: Option<BackendKind>,
    lm_command: Option<String>,
    model: Option<String>,
    api_base: Option<String>,
    temperature: Option<f32>,
    competitor_temperature: Option<f32>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    input_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    prompts_dir: Option<PathBuf>,
    lm_log: Option<PathBuf>,
    thresholds: Option<Thresholds>,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub lm_command: Option<String>,
    pub input_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub lm_log: Option<PathBuf>,
}

/// Resolve settings from every source and validate the result.
pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let settings = resolve_settings(overrides)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Resolve settings without checking that a backend is usable.
pub fn resolve_settings(overrides: &Overrides) -> Result<Settings> {
    let config_path = match &overrides.config_path {
        Some(path) => Some(path.clone()),
        None => discover_config_path(),
    };
    let file = match &config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            load_file_config(path)?
        }
        None => FileConfig::default(),
    };
    resolve(file, &|key| std::env::var(key).ok(), overrides)
}

fn discover_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("pforge").join("config.json"))
        .filter(|path| path.is_file())
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse config {}", path.display()))
}

/// Merge defaults, file, environment and CLI values.
fn resolve(
    file: FileConfig,
    env: &dyn Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<Settings> {
    let mut settings = Settings::default();
    let mut backend = file.backend;

    if let Some(value) = file.lm_command {
        settings.lm_command = Some(value);
    }
    if let Some(value) = file.model {
        settings.model = value;
    }
    if let Some(value) = file.api_base {
        settings.api_base = value;
    }
    if let Some(value) = file.temperature {
        settings.temperature = value;
    }
    if let Some(value) = file.competitor_temperature {
        settings.competitor_temperature = value;
    }
    if let Some(value) = file.max_retries {
        settings.max_retries = value;
    }
    if let Some(value) = file.retry_delay_ms {
        settings.retry_delay_ms = value;
    }
    if let Some(value) = file.request_timeout_secs {
        settings.request_timeout_secs = value;
    }
    if let Some(value) = file.input_path {
        settings.input_path = value;
    }
    if let Some(value) = file.output_dir {
        settings.output_dir = value;
    }
    settings.prompts_dir = file.prompts_dir;
    settings.lm_log = file.lm_log;
    if let Some(value) = file.thresholds {
        settings.thresholds = value;
    }

    let env_value = |key: &str| env(key).filter(|value| !value.trim().is_empty());
    if let Some(value) = env_value("PFORGE_BACKEND") {
        backend = Some(parse_backend(&value)?);
    }
    if let Some(value) = env_value("PFORGE_LM_COMMAND") {
        settings.lm_command = Some(value);
    }
    if let Some(value) = env_value("PFORGE_MODEL") {
        settings.model = value;
    }
    if let Some(value) = env_value("PFORGE_API_BASE") {
        settings.api_base = value;
    }
    if let Some(value) = env_value("PFORGE_MAX_RETRIES") {
        settings.max_retries = value
            .trim()
            .parse()
            .with_context(|| format!("PFORGE_MAX_RETRIES must be an integer (got {value:?})"))?;
    }
    if let Some(value) = env_value("PFORGE_RETRY_DELAY_MS") {
        settings.retry_delay_ms = value
            .trim()
            .parse()
            .with_context(|| format!("PFORGE_RETRY_DELAY_MS must be an integer (got {value:?})"))?;
    }
    if let Some(value) = env_value("PFORGE_INPUT") {
        settings.input_path = PathBuf::from(value);
    }
    if let Some(value) = env_value("PFORGE_OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(value);
    }
    // Kept verbatim so an all-whitespace key is reported by validation.
    settings.api_key = env("OPENAI_API_KEY");

    match overrides.backend {
        Some(value) => backend = Some(value),
        None if overrides.lm_command.is_some() => backend = Some(BackendKind::Command),
        None => {}
    }
    if let Some(value) = &overrides.lm_command {
        settings.lm_command = Some(value.clone());
    }
    if let Some(value) = &overrides.input_path {
        settings.input_path = value.clone();
    }
    if let Some(value) = &overrides.output_dir {
        settings.output_dir = value.clone();
    }
    if let Some(value) = &overrides.lm_log {
        settings.lm_log = Some(value.clone());
    }

    settings.backend = backend.unwrap_or(if settings.lm_command.is_some() {
        BackendKind::Command
    } else {
        BackendKind::Openai
    });
    Ok(settings)
}

fn parse_backend(value: &str) -> Result<BackendKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "command" => Ok(BackendKind::Command),
        "openai" => Ok(BackendKind::Openai),
        other => Err(anyhow!(
            "backend must be \"command\" or \"openai\" (got {other:?})"
        )),
    }
}

/// Validate merged settings before any stage runs.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.max_retries == 0 {
        return Err(anyhow!("max_retries must be at least 1"));
    }
    if settings.request_timeout_secs == 0 {
        return Err(anyhow!("request_timeout_secs must be at least 1"));
    }
    for (label, value) in [
        ("temperature", settings.temperature),
        ("competitor_temperature", settings.competitor_temperature),
    ] {
        if !(0.0..=2.0).contains(&value) {
            return Err(anyhow!("{label} must be within [0, 2] (got {value})"));
        }
    }
    let thresholds = &settings.thresholds;
    if thresholds.min_faq_pairs == 0 || thresholds.faq_question_limit < thresholds.min_faq_pairs {
        return Err(anyhow!(
            "thresholds.faq_question_limit ({}) must be at least thresholds.min_faq_pairs ({}) and both non-zero",
            thresholds.faq_question_limit,
            thresholds.min_faq_pairs
        ));
    }
    if thresholds.max_tagline_chars == 0 {
        return Err(anyhow!("thresholds.max_tagline_chars must be non-zero"));
    }
    match settings.backend {
        BackendKind::Openai => {
            let key = settings.api_key.as_deref().unwrap_or("");
            if key.trim().is_empty() {
                return Err(anyhow!(
                    "OPENAI_API_KEY cannot be empty (set it or select the command backend with --lm)"
                ));
            }
            if settings.model.trim().is_empty() {
                return Err(anyhow!("model must be non-empty"));
            }
        }
        BackendKind::Command => {
            let command = settings.lm_command.as_deref().unwrap_or("");
            let argv = shell_words::split(command)
                .with_context(|| format!("parse LM command: {command}"))?;
            let program = argv
                .first()
                .ok_or_else(|| anyhow!("LM command is empty"))?;
            resolve_program(program)?;
        }
    }
    Ok(())
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = PathBuf::from(program);
        if path.is_file() {
            return Ok(path);
        }
        return Err(anyhow!("LM command not found: {program}"));
    }
    which::which(program).with_context(|| format!("LM command `{program}` not found on PATH"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
