use super::{product_vars, require_text, Stage, StageContext};
use crate::gateway::StructuredOutput;
use crate::model::{ContentBlock, ContentBlocks, ProductData};
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
struct ContentBlockTexts {
    benefits: String,
    usage: String,
    ingredients: String,
    safety: String,
}

impl StructuredOutput for ContentBlockTexts {
    const SCHEMA_NAME: &'static str = "content_blocks";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["benefits", "usage", "ingredients", "safety"],
            "properties": {
                "benefits": {"type": "string"},
                "usage": {"type": "string"},
                "ingredients": {"type": "string"},
                "safety": {"type": "string"}
            }
        })
    }
}

impl ContentBlockTexts {
    fn check(&self) -> Result<(), String> {
        require_text("benefits", &self.benefits)?;
        require_text("usage", &self.usage)?;
        require_text("ingredients", &self.ingredients)?;
        require_text("safety", &self.safety)
    }
}

/// Generates the four reusable content blocks.
pub struct ContentBlocksStage;

impl Stage for ContentBlocksStage {
    fn id(&self) -> StageId {
        StageId::ContentBlocks
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = record.require_product()?;
        let prompt = ctx
            .prompts
            .render(&prompts::CONTENT_BLOCKS, &product_vars(product))?;
        let texts: ContentBlockTexts =
            ctx.gateway
                .invoke(&prompt, ctx.settings.temperature, ContentBlockTexts::check)?;
        tracing::info!("generated content blocks");
        Ok(StageOutput::ContentBlocks(assemble(product, texts)))
    }
}

fn assemble(product: &ProductData, texts: ContentBlockTexts) -> ContentBlocks {
    ContentBlocks {
        benefits: block(
            "benefits",
            texts.benefits,
            [("benefit_count", json!(product.benefits.len()))],
        ),
        usage: block(
            "usage",
            texts.usage,
            [("skin_types", json!(product.skin_type))],
        ),
        ingredients: block(
            "ingredients",
            texts.ingredients,
            [("ingredient_count", json!(product.key_ingredients.len()))],
        ),
        safety: block(
            "safety",
            texts.safety,
            [("side_effects", json!(product.side_effects))],
        ),
    }
}

fn block<const N: usize>(
    block_type: &str,
    content: String,
    metadata: [(&str, Value); N],
) -> ContentBlock {
    let metadata: Map<String, Value> = metadata
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    ContentBlock {
        block_type: block_type.to_string(),
        content,
        metadata: Some(metadata),
    }
}
