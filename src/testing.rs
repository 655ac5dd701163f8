//! Shared fixtures and a scripted generator for unit tests.
use crate::config::Settings;
use crate::gateway::{GenerationRequest, Generator, RetryPolicy, StructuredGateway};
use crate::model::{
    ComparisonFeature, ComparisonPage, CompetitorProduct, ContentBlock, ContentBlocks, FaqPage,
    ProductData, ProductPage, ProductPageMetadata, ProductSection, QaPair, Question,
    QuestionCategory, COMPARISON_PAGE_TYPE, PRODUCT_PAGE_TYPE,
};
use crate::prompts::PromptLibrary;
use crate::record::{RawInput, Record, StageId, StageOutput};
use crate::stages::StageContext;
use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERUM_NAME: &str = "GlowBoost Vitamin C Serum";

pub fn serum_raw_input() -> RawInput {
    let value = json!({
        "product_name": SERUM_NAME,
        "concentration": "10% Vitamin C",
        "skin_type": ["Oily", "Combination"],
        "key_ingredients": ["Vitamin C", "Hyaluronic Acid"],
        "benefits": ["Brightening", "Fades dark spots"],
        "how_to_use": "Apply 2–3 drops in the morning before sunscreen",
        "side_effects": "Mild tingling for sensitive skin",
        "price": "₹699"
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!("fixture is an object"),
    }
}

pub fn serum_product() -> ProductData {
    ProductData {
        product_name: SERUM_NAME.to_string(),
        concentration: "10% Vitamin C".to_string(),
        skin_type: vec!["Oily".to_string(), "Combination".to_string()],
        key_ingredients: vec!["Vitamin C".to_string(), "Hyaluronic Acid".to_string()],
        benefits: vec!["Brightening".to_string(), "Fades dark spots".to_string()],
        how_to_use: "Apply 2–3 drops in the morning before sunscreen".to_string(),
        side_effects: "Mild tingling for sensitive skin".to_string(),
        price: "₹699".to_string(),
    }
}

fn category(index: usize) -> QuestionCategory {
    QuestionCategory::ALL[index % QuestionCategory::ALL.len()]
}

pub fn questions(count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            question: format!("What should I know about topic {i} for this serum?"),
            category: category(i),
        })
        .collect()
}

pub fn question_list_response(count: usize) -> String {
    json!({ "questions": questions(count) }).to_string()
}

const BENEFITS_TEXT: &str = "Brightens dull skin and fades dark spots with steady use.";
const USAGE_TEXT: &str = "Apply two to three drops every morning, then follow with sunscreen.";
const INGREDIENTS_TEXT: &str = "Vitamin C evens tone; hyaluronic acid holds moisture.";
const SAFETY_TEXT: &str = "Mild tingling can occur on sensitive skin; patch test first.";

pub fn content_blocks_response() -> String {
    json!({
        "benefits": BENEFITS_TEXT,
        "usage": USAGE_TEXT,
        "ingredients": INGREDIENTS_TEXT,
        "safety": SAFETY_TEXT
    })
    .to_string()
}

pub fn content_blocks() -> ContentBlocks {
    let block = |block_type: &str, content: &str| ContentBlock {
        block_type: block_type.to_string(),
        content: content.to_string(),
        metadata: None,
    };
    ContentBlocks {
        benefits: block("benefits", BENEFITS_TEXT),
        usage: block("usage", USAGE_TEXT),
        ingredients: block("ingredients", INGREDIENTS_TEXT),
        safety: block("safety", SAFETY_TEXT),
    }
}

pub fn faq_response(count: usize) -> String {
    let pairs: Vec<Value> = questions(count)
        .into_iter()
        .map(|q| {
            json!({
                "question": q.question,
                "answer": "Use it once daily in the morning.",
                "category": q.category
            })
        })
        .collect();
    json!({ "qa_pairs": pairs }).to_string()
}

pub fn product_page_response() -> String {
    json!({
        "tagline": "Brighter skin, every morning.",
        "overview": "A lightweight vitamin C serum for oily and combination skin.",
        "pricing_content": "Clinic-grade brightening for ₹699."
    })
    .to_string()
}

pub fn competitor() -> CompetitorProduct {
    CompetitorProduct {
        product_name: "RadiantC Brightening Serum".to_string(),
        concentration: "15% Vitamin C".to_string(),
        skin_type: vec!["Normal".to_string(), "Dry".to_string()],
        key_ingredients: vec!["Vitamin C".to_string(), "Ferulic Acid".to_string()],
        benefits: vec!["Brightening".to_string(), "Antioxidant protection".to_string()],
        price: "₹899".to_string(),
    }
}

pub fn competitor_response() -> String {
    json!(competitor()).to_string()
}

pub fn comparison_response() -> String {
    json!({
        "comparison_matrix": [
            {
                "feature_name": "Concentration",
                "product_a_value": "10% Vitamin C",
                "product_b_value": "15% Vitamin C",
                "winner": "Product B"
            },
            {
                "feature_name": "Price",
                "product_a_value": "₹699",
                "product_b_value": "₹899",
                "winner": "Product A"
            }
        ],
        "summary": "Both brighten; the competitor is stronger and costlier.",
        "recommendation": "Pick GlowBoost for oily skin on a budget."
    })
    .to_string()
}

/// Successful responses for every generation stage, in pipeline order.
pub fn full_script() -> Vec<Result<String, String>> {
    vec![
        Ok(question_list_response(15)),
        Ok(content_blocks_response()),
        Ok(faq_response(7)),
        Ok(product_page_response()),
        Ok(competitor_response()),
        Ok(comparison_response()),
    ]
}

pub fn faq_page() -> FaqPage {
    let pairs = questions(5)
        .into_iter()
        .map(|q| QaPair {
            question: q.question,
            answer: "Use it once daily in the morning.".to_string(),
            category: q.category,
        })
        .collect();
    FaqPage::new(SERUM_NAME, pairs)
}

pub fn product_page() -> ProductPage {
    let product = serum_product();
    ProductPage {
        page_type: PRODUCT_PAGE_TYPE.to_string(),
        product_name: SERUM_NAME.to_string(),
        tagline: "Brighter skin, every morning.".to_string(),
        sections: vec![ProductSection {
            section_name: "Overview".to_string(),
            content: "A lightweight vitamin C serum.".to_string(),
        }],
        metadata: ProductPageMetadata {
            concentration: product.concentration,
            skin_types: product.skin_type,
            key_ingredients: product.key_ingredients,
            benefits: product.benefits,
            price: product.price,
            total_sections: 1,
        },
    }
}

pub fn comparison_page() -> ComparisonPage {
    ComparisonPage {
        page_type: COMPARISON_PAGE_TYPE.to_string(),
        product_a: serum_product().summary(),
        product_b: competitor(),
        comparison_matrix: vec![ComparisonFeature {
            feature_name: "Price".to_string(),
            product_a_value: "₹699".to_string(),
            product_b_value: "₹899".to_string(),
            winner: Some("Product A".to_string()),
        }],
        summary: "GlowBoost costs less.".to_string(),
        recommendation: "Pick GlowBoost on a budget.".to_string(),
    }
}

/// A record whose fields are populated from fixtures up to and including `last`.
pub fn record_through(last: StageId) -> Record {
    let mut record = Record::new(serum_raw_input());
    for stage in StageId::ORDER {
        if stage.index() > last.index() {
            break;
        }
        let output = match stage {
            StageId::Parse => StageOutput::Product(serum_product()),
            StageId::Questions => StageOutput::Questions(questions(15)),
            StageId::ContentBlocks => StageOutput::ContentBlocks(content_blocks()),
            StageId::Faq => StageOutput::Faq(faq_page()),
            StageId::ProductPage => StageOutput::ProductPage(product_page()),
            StageId::FictionalProduct => StageOutput::Competitor(competitor()),
            StageId::Comparison => StageOutput::Comparison(comparison_page()),
        };
        if let Err(err) = record.apply(stage, output) {
            panic!("fixture apply {stage}: {err}");
        }
    }
    record
}

/// Generator that replays scripted responses and records every request.
/// `Err` entries become backend errors carrying that message.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests_handle(&self) -> Arc<Mutex<Vec<GenerationRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match self.responses.lock().expect("responses lock").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted for {}", request.schema_name)),
        }
    }
}

/// Settings suited to unit tests: no backoff sleeps.
pub fn test_settings() -> Settings {
    Settings {
        retry_delay_ms: 0,
        ..Settings::default()
    }
}

/// Owns everything a [`StageContext`] borrows.
pub struct Harness {
    pub gateway: StructuredGateway,
    pub prompts: PromptLibrary,
    pub settings: Settings,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl Harness {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self::with_settings(responses, test_settings())
    }

    pub fn with_settings(responses: Vec<Result<String, String>>, settings: Settings) -> Self {
        let generator = ScriptedGenerator::new(responses);
        let requests = generator.requests_handle();
        let policy = RetryPolicy::new(
            settings.max_retries,
            Duration::from_millis(settings.retry_delay_ms),
        );
        Self {
            gateway: StructuredGateway::new(Box::new(generator), policy),
            prompts: PromptLibrary::builtin(),
            settings,
            requests,
        }
    }

    pub fn context(&self) -> StageContext<'_> {
        StageContext {
            gateway: &self.gateway,
            prompts: &self.prompts,
            settings: &self.settings,
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}
