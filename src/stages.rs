//! The seven pipeline stages.
//!
//! A stage reads the record, may call the structured gateway, and returns the
//! single field it owns. Failures it recognizes come back as a
//! [`StageError`](crate::error::StageError) inside the `anyhow::Error`;
//! anything else is left for the engine to classify.
mod comparison;
mod competitor;
mod content_blocks;
mod faq;
mod parse;
mod product_page;
mod questions;

pub use comparison::ComparisonStage;
pub use competitor::CompetitorStage;
pub use content_blocks::ContentBlocksStage;
pub use faq::FaqStage;
pub use parse::{parse_product, ParseStage};
pub use product_page::ProductPageStage;
pub use questions::QuestionsStage;

use crate::config::Settings;
use crate::gateway::StructuredGateway;
use crate::model::ProductData;
use crate::prompts::PromptLibrary;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;

/// Collaborators a stage may use while it runs.
pub struct StageContext<'a> {
    pub gateway: &'a StructuredGateway,
    pub prompts: &'a PromptLibrary,
    pub settings: &'a Settings,
}

pub trait Stage {
    fn id(&self) -> StageId;

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput>;
}

/// The production stage list, in pipeline order.
pub fn standard() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ParseStage),
        Box::new(QuestionsStage),
        Box::new(ContentBlocksStage),
        Box::new(FaqStage),
        Box::new(ProductPageStage),
        Box::new(CompetitorStage),
        Box::new(ComparisonStage),
    ]
}

/// Template bindings describing a product.
pub(crate) fn product_vars(product: &ProductData) -> Vec<(&'static str, String)> {
    vec![
        ("product_name", product.product_name.clone()),
        ("concentration", product.concentration.clone()),
        ("skin_type", product.skin_type.join(", ")),
        ("key_ingredients", product.key_ingredients.join(", ")),
        ("benefits", product.benefits.join(", ")),
        ("how_to_use", product.how_to_use.clone()),
        ("side_effects", product.side_effects.clone()),
        ("price", product.price.clone()),
    ]
}

/// Shape check helper: reject blank text fields.
pub(crate) fn require_text(label: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("`{label}` must be non-empty"));
    }
    Ok(())
}
