//! Policy validation error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single defect found in a policy document.
///
/// `context` is a dotted path rooted at `(root)`, e.g.
/// `(root).scaling_rules.0.threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub context: String,
    pub description: String,
}

impl ValidationError {
    pub fn new(context: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.context, self.description)
    }
}

/// Every defect found in one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn root(description: impl Into<String>) -> Self {
        Self(vec![ValidationError::new("(root)", description)])
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// The JSON array form reported to API callers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

/// Errors raised by the plan checker for inputs it cannot judge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanCheckError {
    #[error("unknown plan id {0:?}")]
    UnknownPlan(String),
}

pub type PlanCheckResult<T> = Result<T, PlanCheckError>;
