// Wizard engine
//
// Drives a SequenceGraph one turn at a time: loads the conversation's session
// state, evaluates the inbound answer against the pending step, applies the
// accepted answer, follows transitions, and stores the state once per turn.

use crate::error::{Result, SequenceError, SurveyError};
use crate::prompt::{OutboundMessage, Prompt};
use crate::sequence::{Resolved, SequenceGraph};
use crate::session::SessionState;
use crate::step::{Answer, EndReason, StepDefinition};
use crate::storage::SessionStore;
use crate::types::{ConversationId, SequenceName};
use crate::validator::Rejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Log level for engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Rejected answers tolerated for one step before the conversation ends.
    /// `None` re-asks forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Text sent before the first prompt of a conversation
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,

    /// Text sent when the retry cap ends a conversation
    #[serde(default = "default_retry_limit_message")]
    pub retry_limit_message: String,

    /// Verbosity for the host's tracing subscriber. The engine only emits
    /// events; installing a subscriber is up to the host.
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_greeting() -> Option<String> {
    Some("Hello!".to_string())
}

fn default_retry_limit_message() -> String {
    "Sorry, I'm having trouble understanding. Please call us and one of our experts will help you."
        .to_string()
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            greeting: default_greeting(),
            retry_limit_message: default_retry_limit_message(),
            log_level: LogLevel::default(),
        }
    }
}

/// Messages produced by one turn, before anything is stored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub outbound: Vec<OutboundMessage>,
    pub rejection: Option<Rejection>,
}

/// Result of a boundary operation
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    /// Messages for the transport to send, in order
    pub outbound: Vec<OutboundMessage>,
    /// Session state as stored at the end of the turn
    pub state: SessionState,
    /// Set when the inbound answer was rejected
    pub rejection: Option<Rejection>,
}

impl TurnResult {
    /// The prompt now awaiting an answer, if any
    pub fn prompt(&self) -> Option<&Prompt> {
        self.outbound.iter().rev().find_map(OutboundMessage::as_prompt)
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }
}

/// Drives conversations through a [`SequenceGraph`]
///
/// # Examples
///
/// ```no_run
/// use survey::flow::{self, IntakeConfig, StaticServiceArea};
/// use survey::{ConversationId, WizardEngine};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = flow::reference_graph(Arc::new(StaticServiceArea::default()), &IntakeConfig::default())?;
/// let engine = WizardEngine::builder().graph(graph).build()?;
///
/// let id = ConversationId::from("conversation-1");
/// let start = engine.on_conversation_start(&id).await?;
/// for message in &start.outbound {
///     println!("{}", message.content());
/// }
///
/// let turn = engine.on_inbound_answer(&id, "Let's Go").await?;
/// println!("{}", turn.outbound[0].content());
/// # Ok(())
/// # }
/// ```
pub struct WizardEngine {
    graph: Arc<SequenceGraph>,
    store: Arc<dyn SessionStore>,
    config: WizardConfig,
}

impl WizardEngine {
    pub fn builder() -> WizardEngineBuilder {
        WizardEngineBuilder::new()
    }

    pub fn graph(&self) -> &SequenceGraph {
        &self.graph
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Start (or restart) a conversation at the entry step
    ///
    /// Any earlier state for `id`, ended or not, is replaced.
    pub async fn on_conversation_start(&self, id: &ConversationId) -> Result<TurnResult> {
        info!(conversation_id = %id, "Conversation start");

        let mut state = self.load(id).await?;
        let outbound = self.begin(&mut state);

        self.store.put(state.clone()).await?;
        Ok(TurnResult {
            outbound,
            state,
            rejection: None,
        })
    }

    /// Advance a conversation with one inbound answer
    ///
    /// A missing state is treated as a conversation that has not started. On
    /// `Err` nothing is stored.
    pub async fn on_inbound_answer(&self, id: &ConversationId, raw: &str) -> Result<TurnResult> {
        debug!(conversation_id = %id, raw_length = raw.len(), "Inbound answer");

        let mut state = self.load(id).await?;
        let reply = self.answer(&mut state, raw)?;

        self.store.put(state.clone()).await?;
        Ok(TurnResult {
            outbound: reply.outbound,
            state,
            rejection: reply.rejection,
        })
    }

    /// Stored state for a conversation
    pub async fn session(&self, id: &ConversationId) -> Result<Option<SessionState>> {
        Ok(self.store.get(id).await?)
    }

    async fn load(&self, id: &ConversationId) -> Result<SessionState> {
        match self.store.get(id).await? {
            Some(state) => Ok(state),
            None => {
                debug!(conversation_id = %id, "No stored state, starting fresh");
                Ok(SessionState::new(id.clone()))
            }
        }
    }

    /// Reset `state` and present the entry step
    pub fn begin(&self, state: &mut SessionState) -> Vec<OutboundMessage> {
        state.reset();

        let mut outbound = Vec::new();
        if let Some(greeting) = &self.config.greeting {
            outbound.push(OutboundMessage::text(greeting.clone()));
        }

        let step = self.graph.entry_step();
        state.await_step(self.graph.entry().clone(), step.id().clone());
        outbound.push(step.prompt().into());

        info!(
            conversation_id = %state.conversation_id,
            sequence = %self.graph.entry(),
            step = %step.id(),
            "Wizard started"
        );
        outbound
    }

    /// Apply one inbound answer to `state` without touching storage
    ///
    /// `state` is only modified when `Ok` is returned.
    pub fn answer(&self, state: &mut SessionState, raw: &str) -> Result<Reply> {
        let pending = state
            .pending()
            .map(|(sequence, step)| (sequence.clone(), step.clone()));
        let Some((sequence, step_id)) = pending else {
            if let Some(reason) = state.end_reason() {
                warn!(
                    conversation_id = %state.conversation_id,
                    reason = ?reason,
                    "Ignoring message for ended conversation"
                );
                return Ok(Reply::default());
            }
            debug!(conversation_id = %state.conversation_id, "Answer before start, beginning wizard");
            return Ok(Reply {
                outbound: self.begin(state),
                rejection: None,
            });
        };

        let step = self.graph.step(&sequence, &step_id)?;
        let mut working = state.clone();

        let reply = match step.evaluate(raw, &working.answers) {
            Ok(answer) => {
                trace!(step = %step_id, value = ?answer.value, "Answer accepted");
                let mut outbound = Vec::new();
                self.advance(&mut working, sequence, step, answer, &mut outbound)?;
                Reply {
                    outbound,
                    rejection: None,
                }
            }
            Err(rejection) => self.reject(&mut working, step, rejection),
        };

        *state = working;
        Ok(reply)
    }

    fn reject(&self, state: &mut SessionState, step: &StepDefinition, rejection: Rejection) -> Reply {
        let attempts = state.record_rejection();
        debug!(
            conversation_id = %state.conversation_id,
            step = %step.id(),
            attempts,
            recognized = rejection.recognized,
            "Answer rejected"
        );

        if let Some(max) = self.config.max_attempts {
            if attempts > max {
                warn!(
                    conversation_id = %state.conversation_id,
                    step = %step.id(),
                    attempts,
                    max_attempts = max,
                    "Retry limit reached"
                );
                state.end(EndReason::RetryLimitReached);
                return Reply {
                    outbound: vec![OutboundMessage::text(self.config.retry_limit_message.clone())],
                    rejection: Some(rejection),
                };
            }
        }

        Reply {
            outbound: vec![step.retry(&rejection).into()],
            rejection: Some(rejection),
        }
    }

    /// Record an accepted answer and follow transitions until a step is pending or the wizard ends
    fn advance<'g>(
        &'g self,
        state: &mut SessionState,
        mut sequence: SequenceName,
        mut step: &'g StepDefinition,
        mut answer: Answer,
        outbound: &mut Vec<OutboundMessage>,
    ) -> Result<()> {
        let mut forced = false;
        let mut hops = 0usize;

        loop {
            step.accept(&answer, &mut state.answers, outbound)?;
            state.record_visit(sequence.clone(), step.id().clone(), forced);

            let target = step.route(&answer, &state.answers).ok_or_else(|| {
                SequenceError::MissingFallbackTransition {
                    sequence: sequence.clone(),
                    step: step.id().clone(),
                }
            })?;
            debug!(sequence = %sequence, step = %step.id(), target = ?target, "Transition selected");

            match self.graph.resolve(&sequence, step.id(), target)? {
                Resolved::Await {
                    sequence: next_sequence,
                    step: next,
                } => {
                    state.await_step(next_sequence.name().clone(), next.id().clone());
                    outbound.push(next.prompt().into());
                    return Ok(());
                }
                Resolved::Force {
                    sequence: next_sequence,
                    step: next,
                    answer: value,
                } => {
                    hops += 1;
                    if hops > self.graph.step_count() {
                        return Err(SequenceError::ForcedAnswerCycle {
                            sequence: next_sequence.name().clone(),
                            step: next.id().clone(),
                        }
                        .into());
                    }

                    let injected = next.forced_answer(value).ok_or_else(|| {
                        SequenceError::ForcedAnswerMismatch {
                            sequence: next_sequence.name().clone(),
                            step: next.id().clone(),
                        }
                    })?;
                    answer = next.check(injected, &state.answers).map_err(|rejection| {
                        SurveyError::InvariantViolation(format!(
                            "forced answer for step {} was rejected: {}",
                            rejection.step, rejection.reason
                        ))
                    })?;
                    debug!(step = %next.id(), value = ?answer.value, "Answer forced");

                    sequence = next_sequence.name().clone();
                    step = next;
                    forced = true;
                }
                Resolved::End(ending) => {
                    if let Some(message) = ending.message {
                        outbound.push(OutboundMessage::text(message));
                    }
                    state.end(ending.reason);
                    info!(
                        conversation_id = %state.conversation_id,
                        reason = ?ending.reason,
                        answered_steps = state.step_history.len(),
                        "Wizard ended"
                    );
                    return Ok(());
                }
            }
        }
    }
}

/// Builder for [`WizardEngine`]
pub struct WizardEngineBuilder {
    graph: Option<Arc<SequenceGraph>>,
    store: Option<Arc<dyn SessionStore>>,
    config: WizardConfig,
}

impl WizardEngineBuilder {
    pub fn new() -> Self {
        Self {
            graph: None,
            store: None,
            config: WizardConfig::default(),
        }
    }

    pub fn graph(mut self, graph: SequenceGraph) -> Self {
        self.graph = Some(Arc::new(graph));
        self
    }

    pub fn shared_graph(mut self, graph: Arc<SequenceGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn config(mut self, config: WizardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<WizardEngine> {
        let graph = self
            .graph
            .ok_or_else(|| SurveyError::Configuration("Sequence graph is required".to_string()))?;

        if self.config.max_attempts == Some(0) {
            return Err(SurveyError::Configuration(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(crate::storage::memory::InMemorySessionStore::new()));

        Ok(WizardEngine {
            graph,
            store,
            config: self.config,
        })
    }
}

impl Default for WizardEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
