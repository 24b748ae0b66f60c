//! Error types for the survey library
//!
//! This module provides the error taxonomy using thiserror. Answers that fail
//! validation are not errors: they are reported as [`Rejection`](crate::Rejection)s
//! on the turn result and resolved by re-prompting.

use crate::types::{SequenceName, StepId};
use thiserror::Error;

/// Main error type for survey operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SurveyError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Sequence graph error
    #[error("Sequence graph error: {0}")]
    Sequence(#[from] SequenceError),

    /// A step handler broke an Answer Record invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Sequence graph construction and traversal errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    /// A transition hands off to a sub-sequence that does not exist
    #[error("Unknown sequence reference: step {from} hands off to missing sequence {target}")]
    UnknownSequenceReference { from: StepId, target: SequenceName },

    /// A sub-sequence name is not part of the graph
    #[error("Sequence not found: {0}")]
    UnknownSequence(SequenceName),

    /// A step id is not defined in the named sub-sequence
    #[error("Step not found: {step} in sequence {sequence}")]
    UnknownStep { sequence: SequenceName, step: StepId },

    /// Two steps in one sub-sequence share an id
    #[error("Duplicate step {step} in sequence {sequence}")]
    DuplicateStep { sequence: SequenceName, step: StepId },

    /// Two sub-sequences share a name
    #[error("Duplicate sequence: {0}")]
    DuplicateSequence(SequenceName),

    /// A sub-sequence has no steps
    #[error("Sequence has no steps: {0}")]
    EmptySequence(SequenceName),

    /// The graph has no entry sequence, or it does not exist
    #[error("Entry sequence not found: {0}")]
    MissingEntry(SequenceName),

    /// A step's last transition is conditional, so some accepted answers have nowhere to go
    #[error("Step {step} in sequence {sequence} has no unconditional fallback transition")]
    MissingFallbackTransition { sequence: SequenceName, step: StepId },

    /// A transition condition or forced answer names a choice the step does not offer
    #[error("Choice index {index} out of range for step {step}")]
    InvalidChoiceIndex { step: StepId, index: usize },

    /// A forced answer does not fit the kind of answer its target step expects
    #[error("Forced answer does not match the answer kind of step {step} in sequence {sequence}")]
    ForcedAnswerMismatch { sequence: SequenceName, step: StepId },

    /// Forced answers loop back to a step already being forced
    #[error("Forced answers form a cycle through step {step} in sequence {sequence}")]
    ForcedAnswerCycle { sequence: SequenceName, step: StepId },
}

/// Storage-related errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection failed
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Serialization failed
    #[error("Storage serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Storage deserialization failed: {0}")]
    Deserialization(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Storage backend not available
    #[error("Storage backend not available: {0}")]
    BackendUnavailable(String),

    /// Internal storage error
    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// Type alias for survey Result
pub type Result<T> = std::result::Result<T, SurveyError>;

/// Type alias for Storage Result
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Type alias for Sequence Result
pub type SequenceResult<T> = std::result::Result<T, SequenceError>;
