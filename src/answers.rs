//! Answer Record: the data accumulated for one respondent
//!
//! Fields start unset and are filled in by step handlers as answers are accepted.
//! Household and child counts are only reachable through checked setters so the
//! `child_count < household_size` invariant cannot be broken silently.

use crate::error::{Result, SurveyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who the respondent is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RequesteeType {
    #[serde(rename = "Just Me")]
    JustMe,
    #[serde(rename = "Me & Spouse")]
    MeAndSpouse,
    #[serde(rename = "Me, Spouse & Kid(s)")]
    MeSpouseAndKids,
    #[serde(rename = "Me & Kid(s)")]
    MeAndKids,
    #[serde(rename = "Just Kid(s)")]
    JustKids,
    #[default]
    Unknown,
}

impl RequesteeType {
    /// Every selectable variant, in presentation order
    pub const CHOICES: [RequesteeType; 5] = [
        Self::JustMe,
        Self::MeAndSpouse,
        Self::MeSpouseAndKids,
        Self::MeAndKids,
        Self::JustKids,
    ];

    /// Display label, identical to the choice text shown to the respondent
    pub fn label(&self) -> &'static str {
        match self {
            Self::JustMe => "Just Me",
            Self::MeAndSpouse => "Me & Spouse",
            Self::MeSpouseAndKids => "Me, Spouse & Kid(s)",
            Self::MeAndKids => "Me & Kid(s)",
            Self::JustKids => "Just Kid(s)",
            Self::Unknown => "Unknown",
        }
    }

    /// Map a choice label back to its variant; anything else is `Unknown`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::CHOICES
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label))
            .unwrap_or(Self::Unknown)
    }

    /// Whether any children are to be covered
    pub fn includes_children(&self) -> bool {
        matches!(
            self,
            Self::MeSpouseAndKids | Self::MeAndKids | Self::JustKids
        )
    }
}

impl fmt::Display for RequesteeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the respondent trades premium against out-of-pocket cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPreference {
    LowerMonthlyPayment,
    PredictableCosts,
}

impl BudgetPreference {
    pub const CHOICES: [BudgetPreference; 2] = [Self::LowerMonthlyPayment, Self::PredictableCosts];

    pub fn label(&self) -> &'static str {
        match self {
            Self::LowerMonthlyPayment => {
                "I prefer a lower monthly payment even if it means I have to pay more when I'm receiving care."
            }
            Self::PredictableCosts => {
                "I prefer lower, more predictable costs when I receive care, even if it means a higher monthly payment."
            }
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::CHOICES
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for BudgetPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A five digit US zip code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZipCode(u32);

impl ZipCode {
    /// Parse text consisting of exactly five ASCII digits
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() == 5 && text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse().ok().map(Self)
        } else {
            None
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        (value < 100_000).then_some(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

/// Accumulated answers for one conversation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Who needs coverage
    #[serde(default)]
    pub requestee_type: RequesteeType,
    /// Where the respondent lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<ZipCode>,
    /// Service area lookup result for `zip_code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serviced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    household_size: Option<u32>,
    #[serde(default)]
    child_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annual_income: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_preference: Option<BudgetPreference>,
}

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn household_size(&self) -> Option<u32> {
        self.household_size
    }

    pub fn child_count(&self) -> u32 {
        self.child_count
    }

    pub fn annual_income(&self) -> Option<Decimal> {
        self.annual_income
    }

    /// Set the number of people in the household, including the respondent
    pub fn set_household_size(&mut self, size: u32) -> Result<()> {
        if size == 0 {
            return Err(SurveyError::InvariantViolation(
                "household size must be at least 1".to_string(),
            ));
        }
        if self.child_count >= size {
            return Err(SurveyError::InvariantViolation(format!(
                "household size {} does not exceed child count {}",
                size, self.child_count
            )));
        }
        self.household_size = Some(size);
        Ok(())
    }

    /// Set the number of children; requires a known household size greater than `count`
    pub fn set_child_count(&mut self, count: u32) -> Result<()> {
        match self.household_size {
            Some(size) if count < size => {
                self.child_count = count;
                Ok(())
            }
            Some(size) => Err(SurveyError::InvariantViolation(format!(
                "child count {} must be less than household size {}",
                count, size
            ))),
            None if count == 0 => {
                self.child_count = 0;
                Ok(())
            }
            None => Err(SurveyError::InvariantViolation(
                "child count set before household size".to_string(),
            )),
        }
    }

    pub fn set_annual_income(&mut self, income: Decimal) -> Result<()> {
        if income.is_sign_negative() && !income.is_zero() {
            return Err(SurveyError::InvariantViolation(format!(
                "annual income {} is negative",
                income
            )));
        }
        self.annual_income = Some(income);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_defaults() {
        let record = AnswerRecord::new();
        assert_eq!(record.requestee_type, RequesteeType::Unknown);
        assert!(record.zip_code.is_none());
        assert!(record.serviced.is_none());
        assert!(record.household_size().is_none());
        assert_eq!(record.child_count(), 0);
        assert!(record.annual_income().is_none());
        assert!(record.budget_preference.is_none());
    }

    #[test]
    fn test_requestee_labels_round_trip() {
        for requestee in RequesteeType::CHOICES {
            assert_eq!(RequesteeType::from_label(requestee.label()), requestee);
        }
        assert_eq!(RequesteeType::from_label("me & kid(s)"), RequesteeType::MeAndKids);
        assert_eq!(RequesteeType::from_label("the dog"), RequesteeType::Unknown);
    }

    #[test]
    fn test_requestee_includes_children() {
        assert!(!RequesteeType::JustMe.includes_children());
        assert!(!RequesteeType::MeAndSpouse.includes_children());
        assert!(RequesteeType::MeSpouseAndKids.includes_children());
        assert!(RequesteeType::MeAndKids.includes_children());
        assert!(RequesteeType::JustKids.includes_children());
        assert!(!RequesteeType::Unknown.includes_children());
    }

    #[test]
    fn test_requestee_serializes_as_label() {
        let json = serde_json::to_string(&RequesteeType::MeAndKids).unwrap();
        assert_eq!(json, "\"Me & Kid(s)\"");
    }

    #[test]
    fn test_zip_code_parse() {
        assert_eq!(ZipCode::parse("12205").map(|z| z.value()), Some(12205));
        assert_eq!(ZipCode::parse(" 02134 ").map(|z| z.to_string()), Some("02134".to_string()));
        assert!(ZipCode::parse("1220").is_none());
        assert!(ZipCode::parse("122055").is_none());
        assert!(ZipCode::parse("12a05").is_none());
        assert!(ZipCode::parse("-1220").is_none());
    }

    #[test]
    fn test_child_count_must_stay_below_household_size() {
        let mut record = AnswerRecord::new();
        record.set_household_size(4).unwrap();
        assert!(record.set_child_count(3).is_ok());
        assert!(matches!(
            record.set_child_count(4),
            Err(SurveyError::InvariantViolation(_))
        ));
        assert_eq!(record.child_count(), 3);
    }

    #[test]
    fn test_child_count_requires_household_size() {
        let mut record = AnswerRecord::new();
        assert!(record.set_child_count(0).is_ok());
        assert!(record.set_child_count(1).is_err());
    }

    #[test]
    fn test_household_size_cannot_drop_to_child_count() {
        let mut record = AnswerRecord::new();
        record.set_household_size(3).unwrap();
        record.set_child_count(2).unwrap();
        assert!(record.set_household_size(2).is_err());
        assert!(record.set_household_size(0).is_err());
        assert_eq!(record.household_size(), Some(3));
    }

    #[test]
    fn test_negative_income_is_rejected() {
        let mut record = AnswerRecord::new();
        assert!(record.set_annual_income(dec!(-1)).is_err());
        assert!(record.set_annual_income(dec!(0)).is_ok());
        assert!(record.set_annual_income(dec!(40000.50)).is_ok());
        assert_eq!(record.annual_income(), Some(dec!(40000.50)));
    }

    #[test]
    fn test_record_serialization() {
        let mut record = AnswerRecord::new();
        record.requestee_type = RequesteeType::JustMe;
        record.zip_code = ZipCode::parse("12205");
        record.set_household_size(1).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: AnswerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
