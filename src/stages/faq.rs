use super::{product_vars, require_text, Stage, StageContext};
use crate::error::StageError;
use crate::gateway::StructuredOutput;
use crate::model::{FaqPage, QaPair, Question, QuestionCategory};
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct FaqContent {
    qa_pairs: Vec<QaPair>,
}

impl StructuredOutput for FaqContent {
    const SCHEMA_NAME: &'static str = "faq_content";

    fn json_schema() -> Value {
        let categories: Vec<&str> = QuestionCategory::ALL.iter().map(|c| c.as_str()).collect();
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["qa_pairs"],
            "properties": {
                "qa_pairs": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["question", "answer", "category"],
                        "properties": {
                            "question": {"type": "string"},
                            "answer": {"type": "string"},
                            "category": {"type": "string", "enum": categories}
                        }
                    }
                }
            }
        })
    }
}

/// Answers the first few questions and assembles the FAQ page.
pub struct FaqStage;

impl Stage for FaqStage {
    fn id(&self) -> StageId {
        StageId::Faq
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = record.require_product()?;
        let questions = record.require_questions()?;
        let blocks = record.require_content_blocks()?;
        let thresholds = &ctx.settings.thresholds;

        let selected = &questions[..questions.len().min(thresholds.faq_question_limit)];
        if selected.len() < thresholds.min_faq_pairs {
            return Err(StageError::validation(format!(
                "Need at least {} questions for the FAQ page, got {}",
                thresholds.min_faq_pairs,
                selected.len()
            ))
            .with("field", "questions")
            .into());
        }

        let mut vars = product_vars(product);
        vars.extend([
            ("benefits_block", blocks.benefits.content.clone()),
            ("usage_block", blocks.usage.content.clone()),
            ("ingredients_block", blocks.ingredients.content.clone()),
            ("safety_block", blocks.safety.content.clone()),
            ("questions_list", questions_list(selected)),
            ("min_faq_pairs", thresholds.min_faq_pairs.to_string()),
        ]);
        let prompt = ctx.prompts.render(&prompts::FAQ, &vars)?;

        let min_pairs = thresholds.min_faq_pairs;
        let content: FaqContent =
            ctx.gateway
                .invoke(&prompt, ctx.settings.temperature, |content: &FaqContent| {
                    if content.qa_pairs.len() < min_pairs {
                        return Err(format!(
                            "expected at least {min_pairs} Q&A pairs, got {}",
                            content.qa_pairs.len()
                        ));
                    }
                    for (index, pair) in content.qa_pairs.iter().enumerate() {
                        require_text(&format!("qa_pairs[{index}].question"), &pair.question)?;
                        require_text(&format!("qa_pairs[{index}].answer"), &pair.answer)?;
                    }
                    Ok(())
                })?;

        let page = FaqPage::new(&product.product_name, content.qa_pairs);
        tracing::info!(
            pairs = page.total_questions,
            categories = page.categories.len(),
            "generated FAQ page"
        );
        Ok(StageOutput::Faq(page))
    }
}

fn questions_list(questions: &[Question]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(index, q)| format!("{}. [{}] {}", index + 1, q.category, q.question))
        .collect::<Vec<_>>()
        .join("\n")
}
