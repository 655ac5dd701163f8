//! Stage error taxonomy.
//!
//! Every failure that ends a pipeline run is expressed as a [`StageError`].
//! Stages classify the failures they recognize; the engine converts anything
//! else into [`StageError::Unclassified`] exactly once, at its boundary.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered key/value diagnostics attached to a stage error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorContext(Vec<(String, String)>);

impl ErrorContext {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a context entry, keeping first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

/// Error kind without its payload; what the record stores next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Generation,
    Unclassified,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Generation => write!(f, "generation"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// A classified stage failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Required input was absent or malformed before the stage could run.
    #[error("{}", render(.message, .context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// The generation collaborator could not produce a valid structured
    /// result within its retry budget.
    #[error("{}", render(.message, .context))]
    Generation {
        message: String,
        context: ErrorContext,
    },

    /// Anything the stage did not classify itself.
    #[error("{}", render(.message, .context))]
    Unclassified {
        message: String,
        context: ErrorContext,
    },
}

fn render(message: &str, context: &ErrorContext) -> String {
    if context.is_empty() {
        message.to_string()
    } else {
        format!("{message} (context: {context})")
    }
}

impl StageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::Unclassified {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Attach a diagnostic key/value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context_mut().insert(key, value);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::Unclassified { .. } => ErrorKind::Unclassified,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Generation { message, .. }
            | Self::Unclassified { message, .. } => message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Validation { context, .. }
            | Self::Generation { context, .. }
            | Self::Unclassified { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Validation { context, .. }
            | Self::Generation { context, .. }
            | Self::Unclassified { context, .. } => context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_context_is_the_message() {
        let err = StageError::validation("No raw product data provided");
        assert_eq!(err.to_string(), "No raw product data provided");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn display_appends_context_in_insertion_order() {
        let err = StageError::generation("LM gave up")
            .with("schema", "question_list")
            .with("attempts", 3);
        assert_eq!(
            err.to_string(),
            "LM gave up (context: schema=question_list, attempts=3)"
        );
        assert_eq!(err.context().get("attempts"), Some("3"));
    }

    #[test]
    fn with_replaces_existing_key() {
        let err = StageError::unclassified("boom")
            .with("stage", "faq")
            .with("stage", "comparison");
        assert_eq!(err.context().get("stage"), Some("comparison"));
        assert_eq!(err.to_string(), "boom (context: stage=comparison)");
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = StageError::validation("missing questions").into();
        let recovered = err.downcast_ref::<StageError>().expect("downcast");
        assert_eq!(recovered.kind(), ErrorKind::Validation);
    }
}
