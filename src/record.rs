//! The shared record threaded through the pipeline stages.
//!
//! Fields are write-once and owned by exactly one stage. Presence follows the
//! fixed stage order, and once the error field is set the record is a
//! tombstone: nothing else may be written to it.
use crate::error::{ErrorKind, StageError};
use crate::model::{
    CompetitorProduct, ComparisonPage, ContentBlocks, FaqPage, ProductData, ProductPage, Question,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw product facts as handed to the pipeline.
pub type RawInput = serde_json::Map<String, serde_json::Value>;

/// Identity of a pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Parse,
    Questions,
    ContentBlocks,
    Faq,
    ProductPage,
    FictionalProduct,
    Comparison,
}

impl StageId {
    /// The fixed total order of the pipeline.
    pub const ORDER: [StageId; 7] = [
        Self::Parse,
        Self::Questions,
        Self::ContentBlocks,
        Self::Faq,
        Self::ProductPage,
        Self::FictionalProduct,
        Self::Comparison,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Questions => "questions",
            Self::ContentBlocks => "content_blocks",
            Self::Faq => "faq",
            Self::ProductPage => "product_page",
            Self::FictionalProduct => "fictional_product",
            Self::Comparison => "comparison",
        }
    }

    /// Name of the record field this stage owns.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Parse => "product",
            Self::Questions => "questions",
            Self::ContentBlocks => "content_blocks",
            Self::Faq => "faq_page",
            Self::ProductPage => "product_page",
            Self::FictionalProduct => "competitor",
            Self::Comparison => "comparison_page",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The incremental update a stage produces on success.
#[derive(Debug, Clone)]
pub enum StageOutput {
    Product(ProductData),
    Questions(Vec<Question>),
    ContentBlocks(ContentBlocks),
    Faq(FaqPage),
    ProductPage(ProductPage),
    Competitor(CompetitorProduct),
    Comparison(ComparisonPage),
}

impl StageOutput {
    /// The stage whose field this output fills.
    pub fn owner(&self) -> StageId {
        match self {
            Self::Product(_) => StageId::Parse,
            Self::Questions(_) => StageId::Questions,
            Self::ContentBlocks(_) => StageId::ContentBlocks,
            Self::Faq(_) => StageId::Faq,
            Self::ProductPage(_) => StageId::ProductPage,
            Self::Competitor(_) => StageId::FictionalProduct,
            Self::Comparison(_) => StageId::Comparison,
        }
    }
}

/// Terminal failure recorded on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub stage: StageId,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed ({}): {}", self.stage, self.kind, self.message)
    }
}

/// Shape of a record once the engine has finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalShape {
    Complete,
    Failed(StageId),
    /// Neither complete nor failed; only observable mid-run.
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    raw_input: RawInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<ProductData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<Question>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_blocks: Option<ContentBlocks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    faq_page: Option<FaqPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_page: Option<ProductPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    competitor: Option<CompetitorProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison_page: Option<ComparisonPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RecordError>,
}

impl Record {
    pub fn new(raw_input: RawInput) -> Self {
        Self {
            raw_input,
            product: None,
            questions: None,
            content_blocks: None,
            faq_page: None,
            product_page: None,
            competitor: None,
            comparison_page: None,
            error: None,
        }
    }

    pub fn raw_input(&self) -> &RawInput {
        &self.raw_input
    }

    pub fn product(&self) -> Option<&ProductData> {
        self.product.as_ref()
    }

    pub fn questions(&self) -> Option<&[Question]> {
        self.questions.as_deref()
    }

    pub fn content_blocks(&self) -> Option<&ContentBlocks> {
        self.content_blocks.as_ref()
    }

    pub fn faq_page(&self) -> Option<&FaqPage> {
        self.faq_page.as_ref()
    }

    pub fn product_page(&self) -> Option<&ProductPage> {
        self.product_page.as_ref()
    }

    pub fn competitor(&self) -> Option<&CompetitorProduct> {
        self.competitor.as_ref()
    }

    pub fn comparison_page(&self) -> Option<&ComparisonPage> {
        self.comparison_page.as_ref()
    }

    pub fn error(&self) -> Option<&RecordError> {
        self.error.as_ref()
    }

    pub fn require_product(&self) -> Result<&ProductData, StageError> {
        self.product().ok_or_else(|| missing(StageId::Parse))
    }

    pub fn require_questions(&self) -> Result<&[Question], StageError> {
        self.questions().ok_or_else(|| missing(StageId::Questions))
    }

    pub fn require_content_blocks(&self) -> Result<&ContentBlocks, StageError> {
        self.content_blocks()
            .ok_or_else(|| missing(StageId::ContentBlocks))
    }

    pub fn require_competitor(&self) -> Result<&CompetitorProduct, StageError> {
        self.competitor()
            .ok_or_else(|| missing(StageId::FictionalProduct))
    }

    /// Whether the field owned by `stage` is populated.
    pub fn has_output(&self, stage: StageId) -> bool {
        match stage {
            StageId::Parse => self.product.is_some(),
            StageId::Questions => self.questions.is_some(),
            StageId::ContentBlocks => self.content_blocks.is_some(),
            StageId::Faq => self.faq_page.is_some(),
            StageId::ProductPage => self.product_page.is_some(),
            StageId::FictionalProduct => self.competitor.is_some(),
            StageId::Comparison => self.comparison_page.is_some(),
        }
    }

    /// Stages whose fields are populated, in stage order.
    pub fn populated(&self) -> Vec<StageId> {
        StageId::ORDER
            .into_iter()
            .filter(|stage| self.has_output(*stage))
            .collect()
    }

    pub fn shape(&self) -> TerminalShape {
        if let Some(error) = &self.error {
            return TerminalShape::Failed(error.stage);
        }
        if StageId::ORDER.iter().all(|stage| self.has_output(*stage)) {
            return TerminalShape::Complete;
        }
        TerminalShape::Partial
    }

    /// Merge a stage's output into the record.
    ///
    /// Rejects writes after a failure, writes to another stage's field,
    /// overwrites, and writes that would skip an earlier stage's field.
    pub fn apply(&mut self, stage: StageId, output: StageOutput) -> Result<(), StageError> {
        if let Some(error) = &self.error {
            return Err(StageError::unclassified(format!(
                "record already failed at {} stage",
                error.stage
            ))
            .with("stage", stage));
        }
        let owner = output.owner();
        if owner != stage {
            return Err(StageError::unclassified(format!(
                "{stage} stage produced the `{}` field owned by the {owner} stage",
                owner.field_name()
            )));
        }
        if self.has_output(stage) {
            return Err(StageError::unclassified(format!(
                "`{}` is already set; fields are write-once",
                stage.field_name()
            )));
        }
        if let Some(gap) = StageId::ORDER[..stage.index()]
            .iter()
            .find(|earlier| !self.has_output(**earlier))
        {
            return Err(StageError::unclassified(format!(
                "`{}` cannot be set before `{}`",
                stage.field_name(),
                gap.field_name()
            )));
        }
        match output {
            StageOutput::Product(value) => self.product = Some(value),
            StageOutput::Questions(value) => self.questions = Some(value),
            StageOutput::ContentBlocks(value) => self.content_blocks = Some(value),
            StageOutput::Faq(value) => self.faq_page = Some(value),
            StageOutput::ProductPage(value) => self.product_page = Some(value),
            StageOutput::Competitor(value) => self.competitor = Some(value),
            StageOutput::Comparison(value) => self.comparison_page = Some(value),
        }
        Ok(())
    }

    /// Set the error tombstone. The first failure wins.
    pub fn fail(&mut self, stage: StageId, error: &StageError) {
        if self.error.is_some() {
            return;
        }
        self.error = Some(RecordError {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

fn missing(stage: StageId) -> StageError {
    StageError::validation(format!(
        "missing required field `{}` (produced by the {stage} stage)",
        stage.field_name()
    ))
    .with("field", stage.field_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    #[test]
    fn new_record_holds_only_raw_input() {
        let record = Record::new(testing::serum_raw_input());
        assert!(record.populated().is_empty());
        assert!(record.error().is_none());
        assert_eq!(record.shape(), TerminalShape::Partial);
    }

    #[test]
    fn apply_rejects_output_owned_by_another_stage() {
        let mut record = Record::new(testing::serum_raw_input());
        let err = record
            .apply(StageId::Questions, StageOutput::Product(testing::serum_product()))
            .expect_err("ownership violation");
        assert_eq!(err.kind(), ErrorKind::Unclassified);
        assert!(record.product().is_none());
    }

    #[test]
    fn apply_rejects_overwrite() {
        let mut record = Record::new(testing::serum_raw_input());
        record
            .apply(StageId::Parse, StageOutput::Product(testing::serum_product()))
            .expect("first write");
        let mut other = testing::serum_product();
        other.product_name = "Other".to_string();
        record
            .apply(StageId::Parse, StageOutput::Product(other))
            .expect_err("second write");
        assert_eq!(
            record.product().map(|p| p.product_name.as_str()),
            Some("GlowBoost Vitamin C Serum")
        );
    }

    #[test]
    fn apply_rejects_out_of_order_fields() {
        let mut record = Record::new(testing::serum_raw_input());
        let err = record
            .apply(
                StageId::Questions,
                StageOutput::Questions(testing::questions(15)),
            )
            .expect_err("questions before product");
        assert!(err.message().contains("`product`"), "{err}");
    }

    #[test]
    fn fail_is_a_tombstone() {
        let mut record = Record::new(testing::serum_raw_input());
        record.fail(StageId::Parse, &StageError::validation("empty input"));
        record.fail(StageId::Questions, &StageError::generation("later"));
        let error = record.error().expect("error set");
        assert_eq!(error.stage, StageId::Parse);
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(record.shape(), TerminalShape::Failed(StageId::Parse));
        record
            .apply(StageId::Parse, StageOutput::Product(testing::serum_product()))
            .expect_err("writes after failure are rejected");
    }

    #[test]
    fn require_reports_missing_field_as_validation() {
        let record = Record::new(testing::serum_raw_input());
        let err = record.require_questions().expect_err("absent");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.context().get("field"), Some("questions"));
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let mut raw = RawInput::new();
        raw.insert("product_name".to_string(), json!("Test"));
        let record = Record::new(raw);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value, json!({"raw_input": {"product_name": "Test"}}));
    }

    #[test]
    fn stage_order_matches_discriminants() {
        for (position, stage) in StageId::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), position);
        }
    }
}
