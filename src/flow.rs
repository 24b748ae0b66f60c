//! Health insurance intake flow
//!
//! Two sub-sequences:
//!
//! - `intake`: readiness, who needs coverage, zip code, household size and,
//!   when children are covered, the number of children.
//! - `financial`: household income, budget preference, and an offer to talk
//!   to an expert.
//!
//! Declining at the readiness step or giving a zip code outside the
//! [`ServiceArea`] ends the conversation. Households at or below the income
//! threshold are never asked about their budget; the lower monthly payment
//! preference is recorded for them instead.
//!
//! The plan summary sent before the closing question is fixed text. No
//! quoting happens here.

use crate::answers::{BudgetPreference, RequesteeType, ZipCode};
use crate::choice::{Choice, ChoiceSet};
use crate::error::{SequenceResult, SurveyError};
use crate::prompt::OutboundMessage;
use crate::sequence::{SequenceGraph, SubSequence};
use crate::step::{AnswerKind, EndReason, Ending, ForcedAnswer, StepDefinition, Target, Transition};
use crate::validator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const INTAKE: &str = "intake";
pub const FINANCIAL: &str = "financial";

pub const READY: &str = "ready";
pub const REQUESTEE_TYPE: &str = "requestee_type";
pub const ZIP_CODE: &str = "zip_code";
pub const HOUSEHOLD_SIZE: &str = "household_size";
pub const KID_COUNT: &str = "kid_count";
pub const INCOME: &str = "income";
pub const BUDGET_PREFERENCE: &str = "budget_preference";
pub const DISCUSS: &str = "discuss";

const NUMBER_RETRY: &str = "I'm sorry I didn't understand your responce, we are expecting a number.";
const CHOICE_RETRY: &str = "I'm sorry, you need to select from one of the choices.";

const PLAN_SUMMARY: &str =
    "Great! It looks like you and your spouse are eligible for the \"Essential Plan 1\" - $20 / month for each of you. ";
const CHILD_PLAN_SUMMARY: &str =
    "And, your 2 children are eligible for subsidized Child Health Plus: $0/month with no additional costs.";

const FOLLOW_UP_MESSAGE: &str = "Great, one of our experts will reach out to you shortly.";
const NOT_NOW_MESSAGE: &str = "No problem. Call us at 1-900-MIX-ALOT whenever you're ready.";

/// Whether a zip code is inside the service area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    Serviced { town: Option<String> },
    NotServiced,
}

impl Coverage {
    pub fn is_serviced(&self) -> bool {
        matches!(self, Self::Serviced { .. })
    }
}

/// Service area lookup
///
/// Consulted once per accepted zip code answer. The result is kept on the
/// answer record as `serviced`.
pub trait ServiceArea: Send + Sync {
    fn coverage(&self, zip: ZipCode) -> Coverage;
}

impl<F> ServiceArea for F
where
    F: Fn(ZipCode) -> Coverage + Send + Sync,
{
    fn coverage(&self, zip: ZipCode) -> Coverage {
        self(zip)
    }
}

/// Service area backed by fixed tables
///
/// The default excludes `99999` and knows `12205` as Albany.
#[derive(Debug, Clone)]
pub struct StaticServiceArea {
    excluded: HashSet<ZipCode>,
    towns: HashMap<ZipCode, String>,
}

impl StaticServiceArea {
    /// An area that services every zip code
    pub fn everywhere() -> Self {
        Self {
            excluded: HashSet::new(),
            towns: HashMap::new(),
        }
    }

    pub fn exclude(mut self, zip: ZipCode) -> Self {
        self.excluded.insert(zip);
        self
    }

    pub fn town(mut self, zip: ZipCode, name: impl Into<String>) -> Self {
        self.towns.insert(zip, name.into());
        self
    }
}

impl ServiceArea for StaticServiceArea {
    fn coverage(&self, zip: ZipCode) -> Coverage {
        if self.excluded.contains(&zip) {
            Coverage::NotServiced
        } else {
            Coverage::Serviced {
                town: self.towns.get(&zip).cloned(),
            }
        }
    }
}

impl Default for StaticServiceArea {
    fn default() -> Self {
        let mut area = Self::everywhere();
        if let Some(sentinel) = ZipCode::from_u32(99999) {
            area = area.exclude(sentinel);
        }
        if let Some(albany) = ZipCode::from_u32(12205) {
            area = area.town(albany, "Albany");
        }
        area
    }
}

/// Tunables of the intake flow
///
/// There is no household default. Household size and child count always
/// come from the respondent, and hosts that prefill them from elsewhere do
/// so through their own accept handler on a custom graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Incomes at or below this skip the budget question
    #[serde(default = "default_income_threshold")]
    pub income_threshold: Decimal,

    #[serde(default = "default_ready_decline_message")]
    pub ready_decline_message: String,

    #[serde(default = "default_out_of_area_message")]
    pub out_of_area_message: String,
}

fn default_income_threshold() -> Decimal {
    Decimal::new(50_000, 0)
}

fn default_ready_decline_message() -> String {
    "Call us at 1-900-MIX-ALOT when you are ready.".to_string()
}

fn default_out_of_area_message() -> String {
    "Sorry, we don't service your area.  :(".to_string()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            income_threshold: default_income_threshold(),
            ready_decline_message: default_ready_decline_message(),
            out_of_area_message: default_out_of_area_message(),
        }
    }
}

/// Build the intake flow
pub fn reference_graph(
    service_area: Arc<dyn ServiceArea>,
    config: &IntakeConfig,
) -> SequenceResult<SequenceGraph> {
    SequenceGraph::builder(INTAKE)
        .sequence(intake_sequence(service_area, config))
        .sequence(financial_sequence(config))
        .build()
}

fn intake_sequence(service_area: Arc<dyn ServiceArea>, config: &IntakeConfig) -> SubSequence {
    let ready = StepDefinition::new(
        READY,
        "I've got just a few questions to help quote the best plan for your needs.",
        AnswerKind::choice(ChoiceSet::new(vec![
            Choice::new("Let's Go").with_synonyms(["proceed", "yes", "ready", "go"]),
            Choice::new("I Prefer Humans"),
        ])),
    )
    .retry_prompt("I'm sorry I didn't understand your responce.")
    .transition(Transition::on_choice(0, Target::Next))
    .then(Target::End(Ending::with_message(
        EndReason::Declined,
        config.ready_decline_message.clone(),
    )));

    let requestee_type = StepDefinition::new(
        REQUESTEE_TYPE,
        "Who do you need insurance for?",
        AnswerKind::choice(ChoiceSet::from_labels(
            RequesteeType::CHOICES.iter().map(RequesteeType::label),
        )),
    )
    .retry_prompt(
        "I'm sorry I didn't understand your responce, try typing the number of one of the choices.",
    )
    .on_accepted(|answer, record, _| {
        let choice = answer.as_choice().ok_or_else(|| unexpected_kind(REQUESTEE_TYPE))?;
        record.requestee_type = RequesteeType::from_label(&choice.value);
        Ok(())
    })
    .then(Target::Next);

    let zip_code = StepDefinition::new(ZIP_CODE, "What's your zip code?", AnswerKind::integer())
        .retry_prompt(
            "I'm sorry I didn't understand your responce.  Please enter a 5 digit number for the zipcode.",
        )
        .validate_with(validator::zip_code)
        .on_accepted(move |answer, record, outbound| {
            let zip = ZipCode::parse(&answer.raw).ok_or_else(|| {
                SurveyError::InvariantViolation(format!("accepted zip code {:?} is not 5 digits", answer.raw))
            })?;
            record.zip_code = Some(zip);
            // One lookup per answer; the transition below reads the stored result
            let coverage = service_area.coverage(zip);
            record.serviced = Some(coverage.is_serviced());
            if let Coverage::Serviced { town } = coverage {
                let town = town.unwrap_or_else(|| zip.to_string());
                outbound.push(OutboundMessage::text(format!("Looking good, {}!", town)));
            }
            Ok(())
        })
        .transition(Transition::when(
            |_, record| record.serviced == Some(false),
            Target::End(Ending::with_message(
                EndReason::NotServiced,
                config.out_of_area_message.clone(),
            )),
        ))
        .then(Target::Next);

    let household_size = StepDefinition::new(
        HOUSEHOLD_SIZE,
        "How many people live in your household, including you?",
        AnswerKind::integer().min(1).max(i64::from(u32::MAX)),
    )
    .retry_prompt(NUMBER_RETRY)
    .on_accepted(|answer, record, _| {
        let size = answer.as_integer().ok_or_else(|| unexpected_kind(HOUSEHOLD_SIZE))?;
        record.set_household_size(to_u32(HOUSEHOLD_SIZE, size)?)
    })
    .transition(Transition::when(
        |_, record| record.requestee_type.includes_children(),
        Target::Next,
    ))
    .then(Target::HandOff(FINANCIAL.into()));

    let kid_count = StepDefinition::new(
        KID_COUNT,
        "How many kids are under 19? Tip: While you can cover children under age 26 on a family plan, children under age 19 may be eligible for free or low cost programs.",
        AnswerKind::integer().min(0),
    )
    .retry_prompt(NUMBER_RETRY)
    .validate_with(validator::child_count)
    .on_accepted(|answer, record, _| {
        let count = answer.as_integer().ok_or_else(|| unexpected_kind(KID_COUNT))?;
        record.set_child_count(to_u32(KID_COUNT, count)?)
    })
    .then(Target::HandOff(FINANCIAL.into()));

    SubSequence::new(INTAKE)
        .step(ready)
        .step(requestee_type)
        .step(zip_code)
        .step(household_size)
        .step(kid_count)
}

fn financial_sequence(config: &IntakeConfig) -> SubSequence {
    let threshold = config.income_threshold;

    let income = StepDefinition::new(
        INCOME,
        "What will your total household income be this year? Tip: Just your best guess is fine - this helps us determine if you're eligible for government-funded discounts and options.",
        AnswerKind::decimal().min(0),
    )
    .retry_prompt(NUMBER_RETRY)
    .on_accepted(|answer, record, _| {
        let income = answer.as_decimal().ok_or_else(|| unexpected_kind(INCOME))?;
        record.set_annual_income(income)
    })
    .transition(Transition::when(
        move |_, record| record.annual_income().is_some_and(|income| income <= threshold),
        Target::Force {
            step: BUDGET_PREFERENCE.into(),
            answer: ForcedAnswer::Choice(0),
        },
    ))
    .then(Target::Next);

    let budget_preference = StepDefinition::new(
        BUDGET_PREFERENCE,
        "When you think about your budget, which best describes you?",
        AnswerKind::choice(ChoiceSet::from_labels(
            BudgetPreference::CHOICES.iter().map(BudgetPreference::label),
        )),
    )
    .retry_prompt(CHOICE_RETRY)
    .on_accepted(|answer, record, outbound| {
        let choice = answer
            .as_choice()
            .ok_or_else(|| unexpected_kind(BUDGET_PREFERENCE))?;
        let preference = BudgetPreference::CHOICES
            .get(choice.index)
            .copied()
            .ok_or_else(|| unexpected_kind(BUDGET_PREFERENCE))?;
        record.budget_preference = Some(preference);
        outbound.push(OutboundMessage::text(PLAN_SUMMARY));
        outbound.push(OutboundMessage::text(CHILD_PLAN_SUMMARY));
        Ok(())
    })
    .then(Target::Next);

    let discuss = StepDefinition::new(
        DISCUSS,
        "Want to discuss further with one of our experts?",
        AnswerKind::choice(ChoiceSet::from_labels([
            "Yes, Schedule a Call",
            "Yes, Call Me Now",
            "Not Right Now",
        ])),
    )
    .retry_prompt(CHOICE_RETRY)
    .transition(Transition::on_choice(
        2,
        Target::End(Ending::with_message(EndReason::Completed, NOT_NOW_MESSAGE)),
    ))
    .then(Target::End(Ending::with_message(
        EndReason::Completed,
        FOLLOW_UP_MESSAGE,
    )));

    SubSequence::new(FINANCIAL)
        .step(income)
        .step(budget_preference)
        .step(discuss)
}

fn unexpected_kind(step: &str) -> SurveyError {
    SurveyError::InvariantViolation(format!("step {} received an answer of the wrong kind", step))
}

fn to_u32(step: &str, value: i64) -> crate::error::Result<u32> {
    u32::try_from(value).map_err(|_| {
        SurveyError::InvariantViolation(format!("step {} accepted out of range value {}", step, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerRecord;
    use crate::step::Answer;

    fn graph() -> SequenceGraph {
        reference_graph(Arc::new(StaticServiceArea::default()), &IntakeConfig::default()).unwrap()
    }

    #[test]
    fn test_graph_shape() {
        let graph = graph();
        assert_eq!(graph.entry().as_str(), INTAKE);
        assert_eq!(graph.entry_step().id().as_str(), READY);
        assert_eq!(graph.step_count(), 8);
        assert_eq!(graph.sequence(&FINANCIAL.into()).unwrap().steps().len(), 3);
    }

    #[test]
    fn test_default_service_area() {
        let area = StaticServiceArea::default();
        let albany = ZipCode::parse("12205").unwrap();
        assert_eq!(
            area.coverage(albany),
            Coverage::Serviced {
                town: Some("Albany".to_string())
            }
        );
        assert_eq!(area.coverage(ZipCode::parse("99999").unwrap()), Coverage::NotServiced);
        assert_eq!(
            area.coverage(ZipCode::parse("10001").unwrap()),
            Coverage::Serviced { town: None }
        );
    }

    #[test]
    fn test_closure_service_area() {
        let area = |zip: ZipCode| {
            if zip.value() < 10000 {
                Coverage::NotServiced
            } else {
                Coverage::Serviced { town: None }
            }
        };
        assert!(!area.coverage(ZipCode::parse("02134").unwrap()).is_serviced());
        assert!(area.coverage(ZipCode::parse("12205").unwrap()).is_serviced());
    }

    #[test]
    fn test_intake_config_defaults() {
        let config: IntakeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IntakeConfig::default());
        assert_eq!(config.income_threshold, Decimal::new(50_000, 0));
    }

    #[test]
    fn test_zip_handler_acknowledges_town() {
        let graph = graph();
        let step = graph.step(&INTAKE.into(), &ZIP_CODE.into()).unwrap();
        let mut record = AnswerRecord::new();
        let mut outbound = Vec::new();

        let answer = step.evaluate("12205", &record).unwrap();
        step.accept(&answer, &mut record, &mut outbound).unwrap();

        assert_eq!(record.zip_code.map(|z| z.value()), Some(12205));
        assert_eq!(outbound, vec![OutboundMessage::text("Looking good, Albany!")]);
    }

    #[test]
    fn test_zip_step_rejections() {
        let graph = graph();
        let step = graph.step(&INTAKE.into(), &ZIP_CODE.into()).unwrap();
        let record = AnswerRecord::new();

        let unrecognized = step.evaluate("my zip", &record).unwrap_err();
        assert!(unrecognized.reason.contains("Please enter a 5 digit number"));

        let short = step.evaluate("1220", &record).unwrap_err();
        assert!(short.reason.contains("needs to be a 5 digit number"));
    }

    #[test]
    fn test_budget_handler_sends_summary() {
        let graph = graph();
        let step = graph
            .step(&FINANCIAL.into(), &BUDGET_PREFERENCE.into())
            .unwrap();
        let mut record = AnswerRecord::new();
        let mut outbound = Vec::new();

        let answer: Answer = step.evaluate("2", &record).unwrap();
        step.accept(&answer, &mut record, &mut outbound).unwrap();

        assert_eq!(record.budget_preference, Some(BudgetPreference::PredictableCosts));
        assert_eq!(outbound.len(), 2);
        assert!(outbound[0].content().contains("Essential Plan 1"));
    }
}
