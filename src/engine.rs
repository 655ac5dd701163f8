//! Stage sequencing with short-circuit on the first error.
//!
//! The engine owns the record for the length of a run. It invokes each stage
//! once, in the fixed order, merges the output, and halts the moment a stage
//! fails. Stage faults it does not recognize (plain `anyhow` errors, panics,
//! rejected merges) become [`StageError::Unclassified`] here and nowhere else.
use crate::error::{ErrorKind, StageError};
use crate::record::{RawInput, Record, StageId, StageOutput};
use crate::stages::{self, Stage, StageContext};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Parse,
    Questions,
    ContentBlocks,
    Faq,
    ProductPage,
    FictionalProduct,
    Comparison,
    Done,
    Failed,
}

impl From<StageId> for WorkflowState {
    fn from(stage: StageId) -> Self {
        match stage {
            StageId::Parse => Self::Parse,
            StageId::Questions => Self::Questions,
            StageId::ContentBlocks => Self::ContentBlocks,
            StageId::Faq => Self::Faq,
            StageId::ProductPage => Self::ProductPage,
            StageId::FictionalProduct => Self::FictionalProduct,
            StageId::Comparison => Self::Comparison,
        }
    }
}

/// What happened when one stage ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: StageId,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub record: Record,
    /// Visited states, ending in `Done` or `Failed`.
    pub states: Vec<WorkflowState>,
    pub outcomes: Vec<StageOutcome>,
}

pub struct Engine {
    stages: Vec<Box<dyn Stage>>,
}

impl Engine {
    /// Register `stages`, which must match the pipeline order exactly.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        let ids: Vec<StageId> = stages.iter().map(|stage| stage.id()).collect();
        if ids != StageId::ORDER {
            let got = ids.iter().map(|id| id.as_str()).collect::<Vec<_>>();
            let want = StageId::ORDER.iter().map(|id| id.as_str()).collect::<Vec<_>>();
            return Err(anyhow!(
                "stage registration out of order: got [{}], expected [{}]",
                got.join(", "),
                want.join(", ")
            ));
        }
        Ok(Self { stages })
    }

    pub fn standard() -> Result<Self> {
        Self::new(stages::standard())
    }

    /// Run every stage against a fresh record. Never fails: stage errors end
    /// up on the returned record.
    pub fn run(&self, raw_input: RawInput, ctx: &StageContext<'_>) -> RunReport {
        let mut record = Record::new(raw_input);
        let mut states = Vec::with_capacity(self.stages.len() + 1);
        let mut outcomes = Vec::with_capacity(self.stages.len());
        let run_started = Instant::now();

        for stage in &self.stages {
            let id = stage.id();
            states.push(WorkflowState::from(id));
            tracing::debug!(stage = %id, "stage starting");

            let started = Instant::now();
            let result =
                invoke(stage.as_ref(), &record, ctx).and_then(|output| record.apply(id, output));
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    tracing::info!(stage = %id, elapsed_ms, "stage complete");
                    outcomes.push(StageOutcome {
                        stage: id,
                        elapsed_ms,
                        error: None,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        stage = %id,
                        kind = %err.kind(),
                        elapsed_ms,
                        error = %err.message(),
                        context = %err.context(),
                        "stage failed, halting"
                    );
                    record.fail(id, &err);
                    outcomes.push(StageOutcome {
                        stage: id,
                        elapsed_ms,
                        error: Some(err.kind()),
                    });
                    states.push(WorkflowState::Failed);
                    return RunReport {
                        record,
                        states,
                        outcomes,
                    };
                }
            }
        }

        states.push(WorkflowState::Done);
        tracing::info!(
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "workflow complete"
        );
        RunReport {
            record,
            states,
            outcomes,
        }
    }
}

/// Run one stage, classifying whatever it did not classify itself.
fn invoke(
    stage: &dyn Stage,
    record: &Record,
    ctx: &StageContext<'_>,
) -> Result<StageOutput, StageError> {
    match panic::catch_unwind(AssertUnwindSafe(|| stage.run(record, ctx))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(classify(err)),
        Err(payload) => Err(StageError::unclassified(format!(
            "Workflow execution error: stage panicked: {}",
            panic_message(payload.as_ref())
        ))
        .with("stage", stage.id())),
    }
}

fn classify(err: anyhow::Error) -> StageError {
    match err.downcast::<StageError>() {
        Ok(classified) => classified,
        Err(other) => StageError::unclassified(format!("Workflow execution error: {other:#}")),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
