use super::{product_vars, Stage, StageContext};
use crate::gateway::StructuredOutput;
use crate::model::{Question, QuestionCategory};
use crate::prompts;
use crate::record::{Record, StageId, StageOutput};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct QuestionList {
    questions: Vec<Question>,
}

impl StructuredOutput for QuestionList {
    const SCHEMA_NAME: &'static str = "question_list";

    fn json_schema() -> Value {
        let categories: Vec<&str> = QuestionCategory::ALL.iter().map(|c| c.as_str()).collect();
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["questions"],
            "properties": {
                "questions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["question", "category"],
                        "properties": {
                            "question": {"type": "string"},
                            "category": {"type": "string", "enum": categories}
                        }
                    }
                }
            }
        })
    }
}

/// Generates categorized user questions about the product.
pub struct QuestionsStage;

impl Stage for QuestionsStage {
    fn id(&self) -> StageId {
        StageId::Questions
    }

    fn run(&self, record: &Record, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let product = record.require_product()?;
        let min = ctx.settings.thresholds.min_questions;
        let mut vars = product_vars(product);
        vars.push(("min_questions", min.to_string()));
        let prompt = ctx.prompts.render(&prompts::QUESTIONS, &vars)?;

        let list: QuestionList =
            ctx.gateway
                .invoke(&prompt, ctx.settings.temperature, |list: &QuestionList| {
                    if list.questions.len() < min {
                        return Err(format!(
                            "expected at least {min} questions, got {}",
                            list.questions.len()
                        ));
                    }
                    for (index, question) in list.questions.iter().enumerate() {
                        super::require_text(&format!("questions[{index}].question"), &question.question)?;
                    }
                    Ok(())
                })?;

        tracing::info!(count = list.questions.len(), "generated questions");
        Ok(StageOutput::Questions(list.questions))
    }
}
