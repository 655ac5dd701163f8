//! Domain types carried by the pipeline record and persisted as pages.
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FAQ_PAGE_TYPE: &str = "FAQ";
pub const PRODUCT_PAGE_TYPE: &str = "Product";
pub const COMPARISON_PAGE_TYPE: &str = "Comparison";

/// Structured product facts produced by the parse stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductData {
    pub product_name: String,
    pub concentration: String,
    pub skin_type: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    pub how_to_use: String,
    pub side_effects: String,
    pub price: String,
}

impl ProductData {
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            product_name: self.product_name.clone(),
            concentration: self.concentration.clone(),
            skin_type: self.skin_type.clone(),
            key_ingredients: self.key_ingredients.clone(),
            benefits: self.benefits.clone(),
            price: self.price.clone(),
        }
    }
}

/// The comparable subset of a product; also the shape of the generated
/// competitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_name: String,
    pub concentration: String,
    #[serde(default)]
    pub skin_type: Vec<String>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub price: String,
}

/// Fictional competitor generated for the comparison page.
pub type CompetitorProduct = ProductSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    #[serde(alias = "informational")]
    Informational,
    #[serde(alias = "safety")]
    Safety,
    #[serde(alias = "usage")]
    Usage,
    #[serde(alias = "purchase")]
    Purchase,
    #[serde(alias = "comparison")]
    Comparison,
    #[serde(alias = "ingredients")]
    Ingredients,
    #[serde(alias = "benefits")]
    Benefits,
}

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 7] = [
        Self::Informational,
        Self::Safety,
        Self::Usage,
        Self::Purchase,
        Self::Comparison,
        Self::Ingredients,
        Self::Benefits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "Informational",
            Self::Safety => "Safety",
            Self::Usage => "Usage",
            Self::Purchase => "Purchase",
            Self::Comparison => "Comparison",
            Self::Ingredients => "Ingredients",
            Self::Benefits => "Benefits",
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub category: QuestionCategory,
}

/// Reusable block of generated copy shared by the FAQ and product pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub block_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlocks {
    pub benefits: ContentBlock,
    pub usage: ContentBlock,
    pub ingredients: ContentBlock,
    pub safety: ContentBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub category: QuestionCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqPage {
    pub page_type: String,
    pub product_name: String,
    pub total_questions: usize,
    pub qa_pairs: Vec<QaPair>,
    pub categories: Vec<QuestionCategory>,
}

impl FaqPage {
    /// Build a page whose counters are derived from the pairs themselves.
    pub fn new(product_name: &str, qa_pairs: Vec<QaPair>) -> Self {
        let mut categories = Vec::new();
        for pair in &qa_pairs {
            if !categories.contains(&pair.category) {
                categories.push(pair.category);
            }
        }
        Self {
            page_type: FAQ_PAGE_TYPE.to_string(),
            product_name: product_name.to_string(),
            total_questions: qa_pairs.len(),
            qa_pairs,
            categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSection {
    pub section_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPageMetadata {
    pub concentration: String,
    pub skin_types: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    pub price: String,
    pub total_sections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub page_type: String,
    pub product_name: String,
    pub tagline: String,
    pub sections: Vec<ProductSection>,
    pub metadata: ProductPageMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonFeature {
    pub feature_name: String,
    pub product_a_value: String,
    pub product_b_value: String,
    #[serde(default)]
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPage {
    pub page_type: String,
    pub product_a: ProductSummary,
    pub product_b: ProductSummary,
    pub comparison_matrix: Vec<ComparisonFeature>,
    pub summary: String,
    pub recommendation: String,
}
