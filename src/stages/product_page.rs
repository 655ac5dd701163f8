use super::{product_vars, require_text, Stage, StageContext};
use crate::gateway::StructuredOutput;
use crate::model::{
    ContentBlocks, ProductData, ProductPage, ProductPageMetadata, ProductSection,
    PRODUCT_PAGE_TYPE,
};
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ProductPageContent {
    tagline: String,
    overview: String,
    pricing_content: String,
}

impl StructuredOutput for ProductPageContent {
    const SCHEMA_NAME: &'static str = "product_page_content";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["tagline", "overview", "pricing_content"],
            "properties": {
                "tagline": {"type": "string"},
                "overview": {"type": "string"},
                "pricing_content": {"type": "string"}
            }
        })
    }
}

/// Builds the marketing product page around the content blocks.
pub struct ProductPageStage;

impl Stage for ProductPageStage {
    fn id(&self) -> StageId {
        StageId::ProductPage
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = record.require_product()?;
        let blocks = record.require_content_blocks()?;
        let max_tagline = ctx.settings.thresholds.max_tagline_chars;

        let mut vars = product_vars(product);
        vars.push(("max_tagline_chars", max_tagline.to_string()));
        let prompt = ctx.prompts.render(&prompts::PRODUCT_PAGE, &vars)?;

        let content: ProductPageContent = ctx.gateway.invoke(
            &prompt,
            ctx.settings.temperature,
            |content: &ProductPageContent| {
                require_text("tagline", &content.tagline)?;
                let chars = content.tagline.chars().count();
                if chars > max_tagline {
                    return Err(format!(
                        "tagline is {chars} characters, limit is {max_tagline}"
                    ));
                }
                require_text("overview", &content.overview)?;
                require_text("pricing_content", &content.pricing_content)
            },
        )?;

        let page = assemble(product, blocks, content);
        tracing::info!(sections = page.sections.len(), "generated product page");
        Ok(StageOutput::ProductPage(page))
    }
}

fn assemble(product: &ProductData, blocks: &ContentBlocks, content: ProductPageContent) -> ProductPage {
    let sections = vec![
        section("Overview", content.overview),
        section("Benefits", blocks.benefits.content.clone()),
        section("Key Ingredients", blocks.ingredients.content.clone()),
        section("How to Use", blocks.usage.content.clone()),
        section("Safety Information", blocks.safety.content.clone()),
        section("Pricing", content.pricing_content),
    ];
    ProductPage {
        page_type: PRODUCT_PAGE_TYPE.to_string(),
        product_name: product.product_name.clone(),
        tagline: content.tagline,
        metadata: ProductPageMetadata {
            concentration: product.concentration.clone(),
            skin_types: product.skin_type.clone(),
            key_ingredients: product.key_ingredients.clone(),
            benefits: product.benefits.clone(),
            price: product.price.clone(),
            total_sections: sections.len(),
        },
        sections,
    }
}

fn section(name: &str, content: String) -> ProductSection {
    ProductSection {
        section_name: name.to_string(),
        content,
    }
}
