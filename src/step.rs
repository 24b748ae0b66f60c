//! Step definitions
//!
//! A step is one question: its prompt, the kind of answer it expects, an
//! optional validator, a handler that records an accepted answer, and the
//! ordered transitions that decide where the conversation goes next.
//!
//! # Example
//!
//! ```rust
//! use survey::{AnswerKind, StepDefinition, Target, Transition, SequenceName};
//!
//! let step = StepDefinition::new(
//!     "household_size",
//!     "How many people live in your household, including you?",
//!     AnswerKind::integer().min(1),
//! )
//! .retry_prompt("I'm sorry I didn't understand your responce, we are expecting a number.")
//! .on_accepted(|answer, record, _out| {
//!     let size = answer.as_integer().unwrap_or_default();
//!     record.set_household_size(u32::try_from(size).unwrap_or_default())
//! })
//! .transition(Transition::always(Target::HandOff(SequenceName::new("financial"))));
//!
//! assert_eq!(step.id().as_str(), "household_size");
//! ```

use crate::answers::AnswerRecord;
use crate::choice::{ChoiceSet, FoundChoice};
use crate::error::Result;
use crate::prompt::{OutboundMessage, Prompt};
use crate::types::{SequenceName, StepId};
use crate::validator::{AnswerValidator, Rejection, Validation, DEFAULT_RETRY_TEXT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace;

/// A recognized answer value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(FoundChoice),
    Integer(i64),
    Decimal(Decimal),
}

/// An answer: the raw text plus the value recognized from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub raw: String,
    pub value: AnswerValue,
}

impl Answer {
    pub fn choice(raw: impl Into<String>, found: FoundChoice) -> Self {
        Self {
            raw: raw.into(),
            value: AnswerValue::Choice(found),
        }
    }

    pub fn integer(raw: impl Into<String>, value: i64) -> Self {
        Self {
            raw: raw.into(),
            value: AnswerValue::Integer(value),
        }
    }

    pub fn decimal(raw: impl Into<String>, value: Decimal) -> Self {
        Self {
            raw: raw.into(),
            value: AnswerValue::Decimal(value),
        }
    }

    pub fn as_choice(&self) -> Option<&FoundChoice> {
        match &self.value {
            AnswerValue::Choice(found) => Some(found),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            AnswerValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Decimal value; integers widen losslessly
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.value {
            AnswerValue::Decimal(value) => Some(value),
            AnswerValue::Integer(value) => Some(Decimal::from(value)),
            AnswerValue::Choice(_) => None,
        }
    }
}

/// The shape of answer a step expects
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerKind {
    /// One of a fixed set of choices
    Choice(ChoiceSet),
    /// A whole number within optional bounds
    Integer { min: Option<i64>, max: Option<i64> },
    /// A decimal amount within optional bounds
    Decimal {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
}

impl AnswerKind {
    pub fn choice(choices: ChoiceSet) -> Self {
        Self::Choice(choices)
    }

    pub fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
        }
    }

    pub fn decimal() -> Self {
        Self::Decimal {
            min: None,
            max: None,
        }
    }

    /// Set the lower bound of a numeric kind; choice kinds are unchanged
    pub fn min(self, bound: i64) -> Self {
        match self {
            Self::Integer { max, .. } => Self::Integer {
                min: Some(bound),
                max,
            },
            Self::Decimal { max, .. } => Self::Decimal {
                min: Some(Decimal::from(bound)),
                max,
            },
            other => other,
        }
    }

    /// Set the upper bound of a numeric kind; choice kinds are unchanged
    pub fn max(self, bound: i64) -> Self {
        match self {
            Self::Integer { min, .. } => Self::Integer {
                min,
                max: Some(bound),
            },
            Self::Decimal { min, .. } => Self::Decimal {
                min,
                max: Some(Decimal::from(bound)),
            },
            other => other,
        }
    }

    pub fn choices(&self) -> Option<&ChoiceSet> {
        match self {
            Self::Choice(set) => Some(set),
            _ => None,
        }
    }

    /// Read a value of this kind from raw text
    pub fn recognize(&self, raw: &str) -> Option<AnswerValue> {
        match self {
            Self::Choice(set) => set.recognize(raw).map(AnswerValue::Choice),
            Self::Integer { .. } => normalize_number(raw).parse().ok().map(AnswerValue::Integer),
            Self::Decimal { .. } => Decimal::from_str(&normalize_number(raw))
                .ok()
                .map(AnswerValue::Decimal),
        }
    }

    /// Check a recognized value against this kind's bounds
    pub fn check_bounds(&self, value: &AnswerValue) -> Validation {
        match (self, value) {
            (Self::Integer { min, max }, AnswerValue::Integer(v)) => {
                bounds(Decimal::from(*v), min.map(Decimal::from), max.map(Decimal::from))
            }
            (Self::Decimal { min, max }, AnswerValue::Decimal(v)) => bounds(*v, *min, *max),
            _ => Validation::Accepted,
        }
    }
}

fn bounds(value: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> Validation {
    if let Some(min) = min {
        if value < min {
            return Validation::reject(format!("Please enter a number of at least {}.", min));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Validation::reject(format!("Please enter a number no larger than {}.", max));
        }
    }
    Validation::Accepted
}

/// Strip a leading currency sign and thousands separators
fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed);
    unsigned.chars().filter(|c| *c != ',').collect()
}

/// Handler run when a step's answer is accepted
///
/// Handlers record the answer into the [`AnswerRecord`] and may queue
/// informational messages. An `Err` aborts the turn.
pub trait AcceptHandler: Send + Sync {
    fn on_accepted(
        &self,
        answer: &Answer,
        record: &mut AnswerRecord,
        outbound: &mut Vec<OutboundMessage>,
    ) -> Result<()>;
}

impl<F> AcceptHandler for F
where
    F: Fn(&Answer, &mut AnswerRecord, &mut Vec<OutboundMessage>) -> Result<()> + Send + Sync,
{
    fn on_accepted(
        &self,
        answer: &Answer,
        record: &mut AnswerRecord,
        outbound: &mut Vec<OutboundMessage>,
    ) -> Result<()> {
        self(answer, record, outbound)
    }
}

type PredicateFn = dyn Fn(&Answer, &AnswerRecord) -> bool + Send + Sync;

/// Predicate over the accepted answer and the updated record
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Answer, &AnswerRecord) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn test(&self, answer: &Answer, record: &AnswerRecord) -> bool {
        (self.0)(answer, record)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Condition for taking a transition
#[derive(Debug, Clone)]
pub enum TransitionCondition {
    /// Always transition
    Always,
    /// Transition if the recognized choice has this index
    Choice(usize),
    /// Transition if the predicate holds
    When(Predicate),
}

impl TransitionCondition {
    pub fn evaluate(&self, answer: &Answer, record: &AnswerRecord) -> bool {
        match self {
            Self::Always => true,
            Self::Choice(index) => answer.as_choice().is_some_and(|c| c.index == *index),
            Self::When(predicate) => predicate.test(answer, record),
        }
    }
}

/// Why a conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every step was answered
    Completed,
    /// The respondent chose not to continue
    Declined,
    /// The respondent is outside the service area
    NotServiced,
    /// The retry cap was exceeded
    RetryLimitReached,
}

/// Terminal transition target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    pub reason: EndReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ending {
    pub fn new(reason: EndReason) -> Self {
        Self {
            reason,
            message: None,
        }
    }

    pub fn with_message(reason: EndReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: Some(message.into()),
        }
    }
}

/// A value injected into a step as if the respondent had given it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedAnswer {
    Choice(usize),
    Integer(i64),
    Decimal(Decimal),
}

/// Where a transition leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The following step in the same sub-sequence; past the last step the sub-sequence is exhausted
    Next,
    /// A named step in the same sub-sequence
    Step(StepId),
    /// The first step of another sub-sequence; the record is kept
    HandOff(SequenceName),
    /// Answer a step of the same sub-sequence without presenting it
    Force { step: StepId, answer: ForcedAnswer },
    /// End the conversation
    End(Ending),
}

/// Transition from one step to the next
#[derive(Debug, Clone)]
pub struct Transition {
    pub condition: TransitionCondition,
    pub target: Target,
}

impl Transition {
    pub fn always(target: Target) -> Self {
        Self {
            condition: TransitionCondition::Always,
            target,
        }
    }

    pub fn on_choice(index: usize, target: Target) -> Self {
        Self {
            condition: TransitionCondition::Choice(index),
            target,
        }
    }

    pub fn when<F>(predicate: F, target: Target) -> Self
    where
        F: Fn(&Answer, &AnswerRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: TransitionCondition::When(Predicate::new(predicate)),
            target,
        }
    }
}

/// Declarative description of a single question
#[derive(Clone)]
pub struct StepDefinition {
    id: StepId,
    prompt: String,
    retry_prompt: Option<String>,
    kind: AnswerKind,
    validator: Option<Arc<dyn AnswerValidator>>,
    handler: Option<Arc<dyn AcceptHandler>>,
    transitions: Vec<Transition>,
}

impl StepDefinition {
    pub fn new(id: impl Into<StepId>, prompt: impl Into<String>, kind: AnswerKind) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            retry_prompt: None,
            kind,
            validator: None,
            handler: None,
            transitions: Vec::new(),
        }
    }

    pub fn retry_prompt(mut self, text: impl Into<String>) -> Self {
        self.retry_prompt = Some(text.into());
        self
    }

    /// Attach a validator written as a closure or function
    pub fn validate_with<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Answer, &AnswerRecord) -> Validation + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn validator(mut self, validator: Arc<dyn AnswerValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Attach the accept handler written as a closure or function
    pub fn on_accepted<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Answer, &mut AnswerRecord, &mut Vec<OutboundMessage>) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn handler(mut self, handler: Arc<dyn AcceptHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Shorthand for an unconditional transition
    pub fn then(self, target: Target) -> Self {
        self.transition(Transition::always(target))
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt
    }

    pub fn retry_text(&self) -> Option<&str> {
        self.retry_prompt.as_deref()
    }

    pub fn kind(&self) -> &AnswerKind {
        &self.kind
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The prompt to send when this step becomes pending
    pub fn prompt(&self) -> Prompt {
        Prompt::new(self.prompt.clone())
            .with_choices(self.choice_labels())
            .with_retry_text(self.retry_prompt.clone())
    }

    /// The prompt to send after a rejected answer
    pub fn retry(&self, rejection: &Rejection) -> Prompt {
        Prompt::new(rejection.reason.clone())
            .with_choices(self.choice_labels())
            .with_retry_text(self.retry_prompt.clone())
    }

    fn choice_labels(&self) -> Vec<String> {
        self.kind.choices().map(ChoiceSet::labels).unwrap_or_default()
    }

    /// Recognize and validate raw respondent text
    pub fn evaluate(
        &self,
        raw: &str,
        record: &AnswerRecord,
    ) -> std::result::Result<Answer, Rejection> {
        let Some(value) = self.kind.recognize(raw) else {
            trace!(step = %self.id, raw = %raw, "Answer not recognized");
            return Err(Rejection {
                step: self.id.clone(),
                raw: raw.to_string(),
                reason: self
                    .retry_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RETRY_TEXT.to_string()),
                recognized: false,
            });
        };

        let answer = Answer {
            raw: raw.to_string(),
            value,
        };
        self.check(answer, record)
    }

    /// Validate an already recognized answer against bounds and the step validator
    pub fn check(
        &self,
        answer: Answer,
        record: &AnswerRecord,
    ) -> std::result::Result<Answer, Rejection> {
        let mut validation = self.kind.check_bounds(&answer.value);
        if validation.is_accepted() {
            if let Some(validator) = &self.validator {
                validation = validator.validate(&answer, record);
            }
        }

        match validation {
            Validation::Accepted => Ok(answer),
            Validation::Rejected { reason } => Err(Rejection {
                step: self.id.clone(),
                raw: answer.raw,
                reason,
                recognized: true,
            }),
        }
    }

    /// Turn a forced value into an answer of this step's kind
    pub fn forced_answer(&self, forced: &ForcedAnswer) -> Option<Answer> {
        match (&self.kind, forced) {
            (AnswerKind::Choice(set), ForcedAnswer::Choice(index)) => set
                .found(*index)
                .map(|found| Answer::choice(found.value.clone(), found)),
            (AnswerKind::Integer { .. }, ForcedAnswer::Integer(value)) => {
                Some(Answer::integer(value.to_string(), *value))
            }
            (AnswerKind::Decimal { .. }, ForcedAnswer::Decimal(value)) => {
                Some(Answer::decimal(value.to_string(), *value))
            }
            _ => None,
        }
    }

    /// Run the accept handler
    pub fn accept(
        &self,
        answer: &Answer,
        record: &mut AnswerRecord,
        outbound: &mut Vec<OutboundMessage>,
    ) -> Result<()> {
        match &self.handler {
            Some(handler) => handler.on_accepted(answer, record, outbound),
            None => Ok(()),
        }
    }

    /// First transition whose condition holds
    pub fn route(&self, answer: &Answer, record: &AnswerRecord) -> Option<&Target> {
        self.transitions
            .iter()
            .find(|t| t.condition.evaluate(answer, record))
            .map(|t| &t.target)
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("prompt", &self.prompt)
            .field("retry_prompt", &self.retry_prompt)
            .field("kind", &self.kind)
            .field("has_validator", &self.validator.is_some())
            .field("has_handler", &self.handler.is_some())
            .field("transitions", &self.transitions)
            .finish()
    }
}
