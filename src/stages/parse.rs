use super::{Stage, StageContext};
use crate::error::StageError;
use crate::model::ProductData;
use crate::record::{RawInput, Record, StageId, StageOutput};
use anyhow::Result;
use serde_json::Value;

/// Turns the raw input mapping into [`ProductData`].
pub struct ParseStage;

impl Stage for ParseStage {
    fn id(&self) -> StageId {
        StageId::Parse
    }

    fn run(&self, record: &Record, _ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = parse_product(record.raw_input())?;
        tracing::info!(product = %product.product_name, "parsed product data");
        Ok(StageOutput::Product(product))
    }
}

/// Parse raw product facts. Missing keys default to empty values; present
/// keys must have the right type.
pub fn parse_product(raw: &RawInput) -> Result<ProductData, StageError> {
    if raw.is_empty() {
        return Err(StageError::validation("No raw product data provided").with("agent", "parser"));
    }
    Ok(ProductData {
        product_name: text_field(raw, "product_name")?,
        concentration: text_field(raw, "concentration")?,
        skin_type: list_field(raw, "skin_type")?,
        key_ingredients: list_field(raw, "key_ingredients")?,
        benefits: list_field(raw, "benefits")?,
        how_to_use: text_field(raw, "how_to_use")?,
        side_effects: text_field(raw, "side_effects")?,
        price: text_field(raw, "price")?,
    })
}

fn text_field(raw: &RawInput, key: &str) -> Result<String, StageError> {
    match raw.get(key) {
        None => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(type_error(key, "a string", other)),
    }
}

fn list_field(raw: &RawInput, key: &str) -> Result<Vec<String>, StageError> {
    match raw.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(text) => Ok(text.clone()),
                other => Err(type_error(&format!("{key}[{index}]"), "a string", other)),
            })
            .collect(),
        Some(other) => Err(type_error(key, "a list of strings", other)),
    }
}

fn type_error(field: &str, expected: &str, found: &Value) -> StageError {
    StageError::validation(format!(
        "Product data validation failed: `{field}` must be {expected}, found {}",
        value_kind(found)
    ))
    .with("agent", "parser")
    .with("field", field)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
