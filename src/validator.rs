//! Answer validation
//!
//! A validator looks at a recognized [`Answer`] and may read earlier fields of
//! the [`AnswerRecord`] to cross-check it. It never mutates anything.

use crate::answers::{AnswerRecord, ZipCode};
use crate::step::Answer;
use crate::types::StepId;
use serde::{Deserialize, Serialize};

/// Fallback retry text for steps that define none
pub const DEFAULT_RETRY_TEXT: &str = "I'm sorry, I didn't understand your response.";

/// Outcome of validating one answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Validation {
    Accepted,
    Rejected { reason: String },
}

impl Validation {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// A rejected answer, as reported on a turn result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Step that rejected the answer
    pub step: StepId,
    /// Raw text that was submitted
    pub raw: String,
    /// Why it was rejected; also the retry prompt text
    pub reason: String,
    /// False when no value of the expected kind could be read at all
    pub recognized: bool,
}

/// Validator seam for steps
pub trait AnswerValidator: Send + Sync {
    fn validate(&self, answer: &Answer, record: &AnswerRecord) -> Validation;
}

impl<F> AnswerValidator for F
where
    F: Fn(&Answer, &AnswerRecord) -> Validation + Send + Sync,
{
    fn validate(&self, answer: &Answer, record: &AnswerRecord) -> Validation {
        self(answer, record)
    }
}

/// Accept only text that is exactly five digits
pub fn validate_zip_code(raw: &str) -> Validation {
    match ZipCode::parse(raw) {
        Some(_) => Validation::Accepted,
        None => Validation::reject(
            "I'm sorry but the zipcode needs to be a 5 digit number.  Please try again.",
        ),
    }
}

/// Step validator for zip code answers
pub fn zip_code(answer: &Answer, _record: &AnswerRecord) -> Validation {
    validate_zip_code(&answer.raw)
}

/// Accept a child count only if it is below the recorded household size
pub fn validate_child_count(count: i64, record: &AnswerRecord) -> Validation {
    match record.household_size() {
        Some(size) if count < i64::from(size) => Validation::Accepted,
        Some(_) => Validation::reject(
            "I'm sorry but you can't have more kids than the number of people in your house.",
        ),
        None => Validation::reject("I need to know how many people live in your household first."),
    }
}

/// Step validator for child count answers
pub fn child_count(answer: &Answer, record: &AnswerRecord) -> Validation {
    match answer.as_integer() {
        Some(count) => validate_child_count(count, record),
        None => Validation::reject(DEFAULT_RETRY_TEXT),
    }
}
