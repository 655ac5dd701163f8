use super::{product_vars, require_text, Stage, StageContext};
use crate::gateway::StructuredOutput;
use crate::model::CompetitorProduct;
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde_json::{json, Value};

impl StructuredOutput for CompetitorProduct {
    const SCHEMA_NAME: &'static str = "competitor_product";

    fn json_schema() -> Value {
        let list = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": [
                "product_name",
                "concentration",
                "skin_type",
                "key_ingredients",
                "benefits",
                "price"
            ],
            "properties": {
                "product_name": {"type": "string"},
                "concentration": {"type": "string"},
                "skin_type": list,
                "key_ingredients": list,
                "benefits": list,
                "price": {"type": "string"}
            }
        })
    }
}

/// Invents a comparable competitor product.
pub struct CompetitorStage;

impl Stage for CompetitorStage {
    fn id(&self) -> StageId {
        StageId::FictionalProduct
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = record.require_product()?;
        let prompt = ctx
            .prompts
            .render(&prompts::COMPETITOR, &product_vars(product))?;
        let competitor: CompetitorProduct = ctx.gateway.invoke(
            &prompt,
            ctx.settings.competitor_temperature,
            |competitor: &CompetitorProduct| require_text("product_name", &competitor.product_name),
        )?;
        tracing::info!(competitor = %competitor.product_name, "generated fictional competitor");
        Ok(StageOutput::Competitor(competitor))
    }
}
