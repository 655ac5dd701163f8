use super::{require_text, Stage, StageContext};
use crate::gateway::StructuredOutput;
use crate::model::{ComparisonFeature, ComparisonPage, ProductSummary, COMPARISON_PAGE_TYPE};
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ComparisonAnalysis {
    comparison_matrix: Vec<ComparisonFeature>,
    summary: String,
    recommendation: String,
}

impl StructuredOutput for ComparisonAnalysis {
    const SCHEMA_NAME: &'static str = "comparison_analysis";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["comparison_matrix", "summary", "recommendation"],
            "properties": {
                "comparison_matrix": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["feature_name", "product_a_value", "product_b_value", "winner"],
                        "properties": {
                            "feature_name": {"type": "string"},
                            "product_a_value": {"type": "string"},
                            "product_b_value": {"type": "string"},
                            "winner": {"type": ["string", "null"]}
                        }
                    }
                },
                "summary": {"type": "string"},
                "recommendation": {"type": "string"}
            }
        })
    }
}

impl ComparisonAnalysis {
    fn check(&self) -> Result<(), String> {
        if self.comparison_matrix.is_empty() {
            return Err("comparison_matrix must contain at least one feature".to_string());
        }
        require_text("summary", &self.summary)?;
        require_text("recommendation", &self.recommendation)
    }
}

/// Compares the product against the generated competitor.
pub struct ComparisonStage;

impl Stage for ComparisonStage {
    fn id(&self) -> StageId {
        StageId::Comparison
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product_a = record.require_product()?.summary();
        let product_b = record.require_competitor()?.clone();

        let mut vars = side_vars(PRODUCT_A_KEYS, &product_a);
        vars.extend(side_vars(PRODUCT_B_KEYS, &product_b));
        let prompt = ctx.prompts.render(&prompts::COMPARISON, &vars)?;

        let analysis: ComparisonAnalysis =
            ctx.gateway
                .invoke(&prompt, ctx.settings.temperature, ComparisonAnalysis::check)?;

        tracing::info!(
            features = analysis.comparison_matrix.len(),
            "generated comparison page"
        );
        Ok(StageOutput::Comparison(ComparisonPage {
            page_type: COMPARISON_PAGE_TYPE.to_string(),
            product_a,
            product_b,
            comparison_matrix: analysis.comparison_matrix,
            summary: analysis.summary,
            recommendation: analysis.recommendation,
        }))
    }
}

const PRODUCT_A_KEYS: [&str; 6] = [
    "product_a_name",
    "product_a_concentration",
    "product_a_skin_type",
    "product_a_ingredients",
    "product_a_benefits",
    "product_a_price",
];

const PRODUCT_B_KEYS: [&str; 6] = [
    "product_b_name",
    "product_b_concentration",
    "product_b_skin_type",
    "product_b_ingredients",
    "product_b_benefits",
    "product_b_price",
];

fn side_vars(keys: [&'static str; 6], product: &ProductSummary) -> Vec<(&'static str, String)> {
    let values = [
        product.product_name.clone(),
        product.concentration.clone(),
        product.skin_type.join(", "),
        product.key_ingredients.join(", "),
        product.benefits.join(", "),
        product.price.clone(),
    ];
    keys.into_iter().zip(values).collect()
}
