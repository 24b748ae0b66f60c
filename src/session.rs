//! Session state for survey conversations
//!
//! This module provides the per-conversation record persisted between turns:
//! where the conversation stands, the answers gathered so far, and the history
//! of answered steps.

use crate::answers::AnswerRecord;
use crate::step::EndReason;
use crate::types::{ConversationId, SequenceName, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a conversation in the wizard
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WizardState {
    /// No step has been presented yet
    #[default]
    NotStarted,
    /// A step's prompt was sent and its answer is pending
    AwaitingAnswer {
        sequence: SequenceName,
        step: StepId,
    },
    /// The conversation is over
    Ended { reason: EndReason },
}

impl WizardState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingAnswer { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}

/// An answered step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVisit {
    pub sequence: SequenceName,
    pub step: StepId,
    /// Whether the answer was injected rather than given by the respondent
    #[serde(default)]
    pub forced: bool,
    pub answered_at: DateTime<Utc>,
}

/// Persisted state of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Conversation this state belongs to
    pub conversation_id: ConversationId,
    /// Current position
    #[serde(default)]
    pub state: WizardState,
    /// Accumulated answers
    #[serde(default)]
    pub answers: AnswerRecord,
    /// Rejected answers for the pending step
    #[serde(default)]
    pub attempts: u32,
    /// Answered steps in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_history: Vec<StepVisit>,
    /// When the state was created
    pub created_at: DateTime<Utc>,
    /// When the state was last updated
    pub updated_at: DateTime<Utc>,
    /// When the current run of the wizard ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Create the default state for a conversation
    pub fn new(conversation_id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            state: WizardState::NotStarted,
            answers: AnswerRecord::default(),
            attempts: 0,
            step_history: Vec::new(),
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    /// Update the updated_at timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// The pending step, if any
    pub fn pending(&self) -> Option<(&SequenceName, &StepId)> {
        match &self.state {
            WizardState::AwaitingAnswer { sequence, step } => Some((sequence, step)),
            _ => None,
        }
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.state {
            WizardState::Ended { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    /// Forget everything gathered so far and return to `NotStarted`
    pub fn reset(&mut self) {
        self.state = WizardState::NotStarted;
        self.answers = AnswerRecord::default();
        self.attempts = 0;
        self.step_history.clear();
        self.ended_at = None;
        self.touch();
    }

    /// Make `step` the pending step
    pub fn await_step(&mut self, sequence: SequenceName, step: StepId) {
        self.state = WizardState::AwaitingAnswer { sequence, step };
        self.attempts = 0;
        self.touch();
    }

    /// Append an answered step to the history
    pub fn record_visit(&mut self, sequence: SequenceName, step: StepId, forced: bool) {
        self.step_history.push(StepVisit {
            sequence,
            step,
            forced,
            answered_at: Utc::now(),
        });
        self.touch();
    }

    /// Count a rejected answer and return the new total
    pub fn record_rejection(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.touch();
        self.attempts
    }

    pub fn end(&mut self, reason: EndReason) {
        self.state = WizardState::Ended { reason };
        self.attempts = 0;
        self.ended_at = Some(Utc::now());
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_not_started() {
        let state = SessionState::new(ConversationId::from("conv-1"));
        assert_eq!(state.state, WizardState::NotStarted);
        assert_eq!(state.answers, AnswerRecord::default());
        assert_eq!(state.attempts, 0);
        assert!(state.pending().is_none());
        assert!(state.end_reason().is_none());
    }

    #[test]
    fn test_wizard_state_serialization() {
        let state = WizardState::AwaitingAnswer {
            sequence: SequenceName::new("intake"),
            step: StepId::new("zip_code"),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "awaiting_answer");
        assert_eq!(json["step"], "zip_code");

        let ended = WizardState::Ended {
            reason: EndReason::Declined,
        };
        let json = serde_json::to_string(&ended).unwrap();
        let deserialized: WizardState = serde_json::from_str(&json).unwrap();
        assert_eq!(ended, deserialized);
    }

    #[test]
    fn test_await_step_resets_attempts() {
        let mut state = SessionState::new(ConversationId::new());
        state.await_step("intake".into(), "zip_code".into());
        assert_eq!(state.record_rejection(), 1);
        assert_eq!(state.record_rejection(), 2);

        state.await_step("intake".into(), "household_size".into());
        assert_eq!(state.attempts, 0);
        let (sequence, step) = state.pending().unwrap();
        assert_eq!(sequence.as_str(), "intake");
        assert_eq!(step.as_str(), "household_size");
    }

    #[test]
    fn test_step_history() {
        let mut state = SessionState::new(ConversationId::new());
        state.record_visit("intake".into(), "ready".into(), false);
        state.record_visit("financial".into(), "budget_preference".into(), true);

        assert_eq!(state.step_history.len(), 2);
        assert!(state.step_history[1].forced);
        assert_eq!(state.step_history[0].step.as_str(), "ready");
    }

    #[test]
    fn test_end_and_reset() {
        let mut state = SessionState::new(ConversationId::new());
        state.answers.set_household_size(3).unwrap();
        state.record_visit("intake".into(), "household_size".into(), false);
        state.end(EndReason::Completed);

        assert!(state.is_ended());
        assert_eq!(state.end_reason(), Some(EndReason::Completed));
        assert!(state.ended_at.is_some());

        state.reset();
        assert_eq!(state.state, WizardState::NotStarted);
        assert!(state.answers.household_size().is_none());
        assert!(state.step_history.is_empty());
        assert!(state.ended_at.is_none());
    }

    #[test]
    fn test_session_touch() {
        let mut state = SessionState::new(ConversationId::new());
        let initial_updated_at = state.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(10));

        state.touch();
        assert!(state.updated_at > initial_updated_at);
    }

    #[test]
    fn test_session_state_round_trip() {
        let mut state = SessionState::new(ConversationId::from("conv-9"));
        state.await_step("financial".into(), "income".into());
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
