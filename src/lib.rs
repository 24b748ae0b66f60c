//! # Survey - Guided Conversational Surveys for Rust
//!
//! Survey is a Rust library for collecting structured answers through a
//! conversation: a branching graph of questions, per-step validation with
//! retry, and an answer record that survives across turns of the same
//! conversation.
//!
//! ## Features
//!
//! - **Sequence Graphs**: Named sub-sequences with conditional branches, hand-offs and forced answers
//! - **Validation**: Recognition of choices, integers and amounts with per-step validators and retry prompts
//! - **Wizard Engine**: Two boundary operations, start and inbound answer, with get-or-default then put storage
//! - **Session Storage**: Trait-based keyed storage with an in-memory default
//! - **Type-Safe**: Every step, hand-off and choice index is checked when the graph is built
//!
//! ## Quick Start
//!
//! ```no_run
//! use survey::flow::{self, IntakeConfig, StaticServiceArea};
//! use survey::{ConversationId, WizardEngine};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = flow::reference_graph(Arc::new(StaticServiceArea::default()), &IntakeConfig::default())?;
//! let engine = WizardEngine::builder().graph(graph).build()?;
//!
//! let id = ConversationId::from("conversation-1");
//! engine.on_conversation_start(&id).await?;
//!
//! for answer in ["proceed", "Me & Kid(s)", "12205", "4", "2", "40000"] {
//!     let turn = engine.on_inbound_answer(&id, answer).await?;
//!     for message in &turn.outbound {
//!         println!("Bot: {}", message.content());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 WizardEngine                    │
//! │  ┌──────────────────────────────────┐          │
//! │  │        SequenceGraph             │          │
//! │  │  - SubSequence  - Transition     │          │
//! │  │  - StepDefinition - Validator    │          │
//! │  └──────────────────────────────────┘          │
//! │  ┌──────────────────────────────────┐          │
//! │  │      Session Storage             │          │
//! │  │  - SessionState - AnswerRecord   │          │
//! │  └──────────────────────────────────┘          │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`]: Wizard engine, configuration and turn results
//! - [`sequence`]: Sub-sequences and the sequence graph builder
//! - [`step`]: Step definitions, answer kinds and transitions
//! - [`validator`]: Validation outcomes and built-in validators
//! - [`choice`]: Choice sets and choice recognition
//! - [`answers`]: The answer record and its field types
//! - [`session`]: Per-conversation session state
//! - [`storage`]: Session storage backends
//! - [`flow`]: The health insurance intake flow
//! - [`prompt`]: Outbound messages
//! - [`error`]: Error types and result aliases
//!
//! ## License
//!
//! Licensed under either of Apache License 2.0 or MIT license at your option.

// Core type definitions
pub mod types;

// Error types
pub mod error;

// Answer record
pub mod answers;

// Outbound messages
pub mod prompt;

// Choice recognition
pub mod choice;

// Validation
pub mod validator;

// Step definitions
pub mod step;

// Sequence graph
pub mod sequence;

// Session state
pub mod session;

// Storage backends
pub mod storage;

// Wizard engine
pub mod engine;

// Insurance intake flow
pub mod flow;

pub use answers::{AnswerRecord, BudgetPreference, RequesteeType, ZipCode};
pub use choice::{Choice, ChoiceSet, FoundChoice};
pub use engine::{LogLevel, Reply, TurnResult, WizardConfig, WizardEngine, WizardEngineBuilder};
pub use error::{Result, SequenceError, SequenceResult, StorageError, StorageResult, SurveyError};
pub use prompt::{OutboundMessage, Prompt};
pub use sequence::{Resolved, SequenceGraph, SequenceGraphBuilder, SubSequence};
pub use session::{SessionState, StepVisit, WizardState};
pub use step::{
    AcceptHandler, Answer, AnswerKind, AnswerValue, EndReason, Ending, ForcedAnswer, Predicate,
    StepDefinition, Target, Transition, TransitionCondition,
};
pub use storage::{memory::InMemorySessionStore, SessionStore};
pub use types::*;
pub use validator::{AnswerValidator, Rejection, Validation};
