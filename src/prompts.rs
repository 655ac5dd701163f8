//! Prompt templates for the generation stages.
//!
//! Built-in templates are compiled in. A prompts directory can override any of
//! them with `<name>.system.md` / `<name>.user.md` files. Placeholders use the
//! `{name}` form and every placeholder must be bound when rendering.
use anyhow::{anyhow, Context, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    system: &'static str,
    user: &'static str,
}

macro_rules! builtin_template {
    ($name:literal) => {
        PromptTemplate {
            name: $name,
            system: include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/prompts/",
                $name,
                ".system.md"
            )),
            user: include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/prompts/",
                $name,
                ".user.md"
            )),
        }
    };
}

pub const QUESTIONS: PromptTemplate = builtin_template!("questions");
pub const CONTENT_BLOCKS: PromptTemplate = builtin_template!("content_blocks");
pub const FAQ: PromptTemplate = builtin_template!("faq");
pub const PRODUCT_PAGE: PromptTemplate = builtin_template!("product_page");
pub const COMPETITOR: PromptTemplate = builtin_template!("competitor");
pub const COMPARISON: PromptTemplate = builtin_template!("comparison");

#[cfg(test)]
pub const ALL: [PromptTemplate; 6] = [
    QUESTIONS,
    CONTENT_BLOCKS,
    FAQ,
    PRODUCT_PAGE,
    COMPETITOR,
    COMPARISON,
];

/// A prompt ready to send: system instructions plus the user task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    overrides_dir: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_overrides(dir: impl Into<PathBuf>) -> Self {
        Self {
            overrides_dir: Some(dir.into()),
        }
    }

    /// Render `template` with `vars`, preferring override files when present.
    pub fn render(
        &self,
        template: &PromptTemplate,
        vars: &[(&str, String)],
    ) -> Result<RenderedPrompt> {
        let system = self.load(template.name, "system", template.system)?;
        let user = self.load(template.name, "user", template.user)?;
        Ok(RenderedPrompt {
            system: substitute(&system, vars)
                .with_context(|| format!("render {}.system prompt", template.name))?,
            user: substitute(&user, vars)
                .with_context(|| format!("render {}.user prompt", template.name))?,
        })
    }

    fn load(&self, name: &str, part: &str, builtin: &'static str) -> Result<String> {
        let Some(dir) = &self.overrides_dir else {
            return Ok(builtin.to_string());
        };
        let path = override_path(dir, name, part);
        if !path.is_file() {
            return Ok(builtin.to_string());
        }
        tracing::debug!(path = %path.display(), "using prompt override");
        fs::read_to_string(&path).with_context(|| format!("read prompt {}", path.display()))
    }
}

fn override_path(dir: &Path, name: &str, part: &str) -> PathBuf {
    dir.join(format!("{name}.{part}.md"))
}

/// Replace `{placeholder}` tokens; any token without a binding is an error.
fn substitute(template: &str, vars: &[(&str, String)]) -> Result<String> {
    let placeholder = Regex::new(r"\{([a-z][a-z0-9_]*)\}").context("compile placeholder regex")?;
    let mut unbound = Vec::new();
    let rendered = placeholder.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => value.clone(),
            None => {
                unbound.push(key.to_string());
                caps[0].to_string()
            }
        }
    });
    if !unbound.is_empty() {
        unbound.dedup();
        return Err(anyhow!("unbound placeholders: {}", unbound.join(", ")));
    }
    Ok(rendered.into_owned())
}
