//! Input loading and page persistence.
//!
//! Pages are written as pretty JSON next to a temp file and renamed into
//! place, so a crashed run never leaves a half-written page behind.
use crate::record::{RawInput, Record};
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const FAQ_FILE: &str = "faq.json";
pub const PRODUCT_PAGE_FILE: &str = "product_page.json";
pub const COMPARISON_PAGE_FILE: &str = "comparison_page.json";

/// Read the raw product facts. The top-level JSON value must be an object.
pub fn load_raw_input(path: &Path) -> Result<RawInput> {
    let bytes = fs::read(path).with_context(|| format!("read input {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse input {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "input {} must be a JSON object of product facts, found {}",
            path.display(),
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write every page present on the record; returns the written paths.
pub fn write_pages(out_dir: &Path, record: &Record) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let mut written = Vec::new();
    write_page(out_dir, FAQ_FILE, record.faq_page(), &mut written)?;
    write_page(out_dir, PRODUCT_PAGE_FILE, record.product_page(), &mut written)?;
    write_page(
        out_dir,
        COMPARISON_PAGE_FILE,
        record.comparison_page(),
        &mut written,
    )?;
    Ok(written)
}

fn write_page<T: Serialize>(
    out_dir: &Path,
    file_name: &str,
    page: Option<&T>,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let Some(page) = page else {
        tracing::warn!(file = file_name, "page not produced, skipping");
        return Ok(());
    };
    let path = out_dir.join(file_name);
    write_json(&path, page)?;
    tracing::info!(path = %display_path(&path, Some(out_dir)), "wrote page");
    written.push(path);
    Ok(())
}

/// Pretty-print `value` to `path`, keeping non-ASCII text as-is.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    bytes.push(b'\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &bytes).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}
