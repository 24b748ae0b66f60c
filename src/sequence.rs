//! Sequence Graph
//!
//! Named sub-sequences of steps plus the edges between them. Every reference a
//! transition makes (steps, hand-off targets, forced answers, choice indices) is
//! resolved when the graph is built, so traversal never meets a dangling name.
//!
//! # Example
//!
//! ```rust
//! use survey::{AnswerKind, SequenceGraph, StepDefinition, SubSequence, Target};
//!
//! let graph = SequenceGraph::builder("intake")
//!     .sequence(
//!         SubSequence::new("intake").step(
//!             StepDefinition::new("household_size", "How many people?", AnswerKind::integer().min(1))
//!                 .then(Target::HandOff("financial".into())),
//!         ),
//!     )
//!     .sequence(
//!         SubSequence::new("financial")
//!             .step(StepDefinition::new("income", "Income?", AnswerKind::decimal()).then(Target::Next)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.entry_step().id().as_str(), "household_size");
//! ```

use crate::error::{SequenceError, SequenceResult};
use crate::step::{Ending, EndReason, ForcedAnswer, StepDefinition, Target, TransitionCondition};
use crate::types::{SequenceName, StepId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A named, ordered group of steps
#[derive(Debug, Clone)]
pub struct SubSequence {
    name: SequenceName,
    steps: Vec<StepDefinition>,
}

impl SubSequence {
    pub fn new(name: impl Into<SequenceName>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &SequenceName {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn first_step(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    pub fn get(&self, id: &StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id() == id)
    }

    fn position(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    /// The step after `id` in declaration order
    pub fn next_after(&self, id: &StepId) -> Option<&StepDefinition> {
        self.position(id).and_then(|i| self.steps.get(i + 1))
    }
}

/// Where a transition landed, resolved against the graph
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    /// A step is now pending
    Await {
        sequence: &'a SubSequence,
        step: &'a StepDefinition,
    },
    /// A step is answered on the respondent's behalf
    Force {
        sequence: &'a SubSequence,
        step: &'a StepDefinition,
        answer: &'a ForcedAnswer,
    },
    /// The conversation is over
    End(Ending),
}

/// Ordered, branching graph of steps
#[derive(Debug, Clone)]
pub struct SequenceGraph {
    entry: SequenceName,
    sequences: HashMap<SequenceName, SubSequence>,
}

impl SequenceGraph {
    /// Start building a graph whose conversations begin at `entry`
    pub fn builder(entry: impl Into<SequenceName>) -> SequenceGraphBuilder {
        SequenceGraphBuilder::new(entry)
    }

    pub fn entry(&self) -> &SequenceName {
        &self.entry
    }

    /// The entry sub-sequence
    pub fn entry_sequence(&self) -> &SubSequence {
        // Presence and non-emptiness are checked by the builder
        &self.sequences[&self.entry]
    }

    /// First step of the entry sub-sequence
    pub fn entry_step(&self) -> &StepDefinition {
        &self.entry_sequence().steps[0]
    }

    pub fn sequence(&self, name: &SequenceName) -> SequenceResult<&SubSequence> {
        self.sequences
            .get(name)
            .ok_or_else(|| SequenceError::UnknownSequence(name.clone()))
    }

    pub fn step(&self, sequence: &SequenceName, step: &StepId) -> SequenceResult<&StepDefinition> {
        self.sequence(sequence)?
            .get(step)
            .ok_or_else(|| SequenceError::UnknownStep {
                sequence: sequence.clone(),
                step: step.clone(),
            })
    }

    pub fn sequence_names(&self) -> impl Iterator<Item = &SequenceName> {
        self.sequences.keys()
    }

    pub fn step_count(&self) -> usize {
        self.sequences.values().map(|s| s.steps.len()).sum()
    }

    /// Resolve a transition target taken from `from` in `sequence`
    pub fn resolve<'a>(
        &'a self,
        sequence: &SequenceName,
        from: &StepId,
        target: &'a Target,
    ) -> SequenceResult<Resolved<'a>> {
        let current = self.sequence(sequence)?;
        let unknown_step = |step: &StepId| SequenceError::UnknownStep {
            sequence: sequence.clone(),
            step: step.clone(),
        };

        match target {
            Target::Next => match current.next_after(from) {
                Some(step) => Ok(Resolved::Await {
                    sequence: current,
                    step,
                }),
                None => {
                    debug!(sequence = %sequence, step = %from, "Sub-sequence exhausted");
                    Ok(Resolved::End(Ending::new(EndReason::Completed)))
                }
            },
            Target::Step(id) => {
                let step = current.get(id).ok_or_else(|| unknown_step(id))?;
                Ok(Resolved::Await {
                    sequence: current,
                    step,
                })
            }
            Target::HandOff(name) => {
                let next = self.sequences.get(name).ok_or_else(|| {
                    SequenceError::UnknownSequenceReference {
                        from: from.clone(),
                        target: name.clone(),
                    }
                })?;
                let step = next
                    .first_step()
                    .ok_or_else(|| SequenceError::EmptySequence(name.clone()))?;
                info!(from_sequence = %sequence, to_sequence = %name, "Sub-sequence hand-off");
                Ok(Resolved::Await {
                    sequence: next,
                    step,
                })
            }
            Target::Force { step: id, answer } => {
                let step = current.get(id).ok_or_else(|| unknown_step(id))?;
                Ok(Resolved::Force {
                    sequence: current,
                    step,
                    answer,
                })
            }
            Target::End(ending) => Ok(Resolved::End(ending.clone())),
        }
    }
}

/// Builder for [`SequenceGraph`]
pub struct SequenceGraphBuilder {
    entry: SequenceName,
    sequences: Vec<SubSequence>,
}

impl SequenceGraphBuilder {
    pub fn new(entry: impl Into<SequenceName>) -> Self {
        Self {
            entry: entry.into(),
            sequences: Vec::new(),
        }
    }

    pub fn sequence(mut self, sequence: SubSequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    /// Validate every reference and freeze the graph
    pub fn build(self) -> SequenceResult<SequenceGraph> {
        let mut sequences: HashMap<SequenceName, SubSequence> = HashMap::new();
        for sequence in self.sequences {
            if sequences.contains_key(&sequence.name) {
                return Err(SequenceError::DuplicateSequence(sequence.name));
            }
            sequences.insert(sequence.name.clone(), sequence);
        }

        match sequences.get(&self.entry) {
            Some(entry) if entry.steps.is_empty() => {
                return Err(SequenceError::EmptySequence(self.entry));
            }
            Some(_) => {}
            None => return Err(SequenceError::MissingEntry(self.entry)),
        }

        for sequence in sequences.values() {
            validate_sequence(sequence, &sequences)?;
            check_forced_cycles(sequence)?;
        }

        let graph = SequenceGraph {
            entry: self.entry,
            sequences,
        };
        warn_unreachable(&graph);

        info!(
            entry = %graph.entry,
            sequence_count = graph.sequences.len(),
            step_count = graph.step_count(),
            "Sequence graph built"
        );

        Ok(graph)
    }
}

fn validate_sequence(
    sequence: &SubSequence,
    sequences: &HashMap<SequenceName, SubSequence>,
) -> SequenceResult<()> {
    if sequence.steps.is_empty() {
        return Err(SequenceError::EmptySequence(sequence.name.clone()));
    }

    let mut seen = HashSet::new();
    for step in &sequence.steps {
        if !seen.insert(step.id()) {
            return Err(SequenceError::DuplicateStep {
                sequence: sequence.name.clone(),
                step: step.id().clone(),
            });
        }
    }

    for step in &sequence.steps {
        let falls_back = step
            .transitions()
            .last()
            .is_some_and(|t| matches!(t.condition, TransitionCondition::Always));
        if !falls_back {
            return Err(SequenceError::MissingFallbackTransition {
                sequence: sequence.name.clone(),
                step: step.id().clone(),
            });
        }

        for transition in step.transitions() {
            if let TransitionCondition::Choice(index) = transition.condition {
                let in_range = step.kind().choices().is_some_and(|set| index < set.len());
                if !in_range {
                    return Err(SequenceError::InvalidChoiceIndex {
                        step: step.id().clone(),
                        index,
                    });
                }
            }
            validate_target(sequence, step, &transition.target, sequences)?;
        }
    }

    Ok(())
}

fn validate_target(
    sequence: &SubSequence,
    from: &StepDefinition,
    target: &Target,
    sequences: &HashMap<SequenceName, SubSequence>,
) -> SequenceResult<()> {
    match target {
        Target::Next | Target::End(_) => Ok(()),
        Target::Step(id) => sequence.get(id).map(|_| ()).ok_or_else(|| SequenceError::UnknownStep {
            sequence: sequence.name.clone(),
            step: id.clone(),
        }),
        Target::HandOff(name) => {
            if sequences.contains_key(name) {
                Ok(())
            } else {
                Err(SequenceError::UnknownSequenceReference {
                    from: from.id().clone(),
                    target: name.clone(),
                })
            }
        }
        Target::Force { step: id, answer } => {
            let step = sequence.get(id).ok_or_else(|| SequenceError::UnknownStep {
                sequence: sequence.name.clone(),
                step: id.clone(),
            })?;
            if step.forced_answer(answer).is_some() {
                return Ok(());
            }
            match answer {
                ForcedAnswer::Choice(index) if step.kind().choices().is_some() => {
                    Err(SequenceError::InvalidChoiceIndex {
                        step: id.clone(),
                        index: *index,
                    })
                }
                _ => Err(SequenceError::ForcedAnswerMismatch {
                    sequence: sequence.name.clone(),
                    step: id.clone(),
                }),
            }
        }
    }
}

/// Forced answers chain without waiting for input, so they must not loop
fn check_forced_cycles(sequence: &SubSequence) -> SequenceResult<()> {
    fn forces<'a>(step: &'a StepDefinition) -> impl Iterator<Item = &'a StepId> {
        step.transitions().iter().filter_map(|t| match &t.target {
            Target::Force { step, .. } => Some(step),
            _ => None,
        })
    }

    fn has_cycle<'a>(
        step_id: &'a StepId,
        sequence: &'a SubSequence,
        visited: &mut HashSet<&'a StepId>,
        rec_stack: &mut HashSet<&'a StepId>,
    ) -> bool {
        if rec_stack.contains(step_id) {
            return true;
        }
        if !visited.insert(step_id) {
            return false;
        }
        rec_stack.insert(step_id);

        if let Some(step) = sequence.get(step_id) {
            for next in forces(step) {
                if has_cycle(next, sequence, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(step_id);
        false
    }

    let mut visited = HashSet::new();
    for step in &sequence.steps {
        let mut rec_stack = HashSet::new();
        if has_cycle(step.id(), sequence, &mut visited, &mut rec_stack) {
            return Err(SequenceError::ForcedAnswerCycle {
                sequence: sequence.name.clone(),
                step: step.id().clone(),
            });
        }
    }
    Ok(())
}

fn warn_unreachable(graph: &SequenceGraph) {
    let mut reached: HashSet<(&SequenceName, &StepId)> = HashSet::new();
    let entry = graph.entry_sequence();
    let mut stack = vec![(entry, graph.entry_step())];

    while let Some((sequence, step)) = stack.pop() {
        if !reached.insert((sequence.name(), step.id())) {
            continue;
        }
        for transition in step.transitions() {
            let next = match &transition.target {
                Target::Next => sequence.next_after(step.id()).map(|s| (sequence, s)),
                Target::Step(id) | Target::Force { step: id, .. } => {
                    sequence.get(id).map(|s| (sequence, s))
                }
                Target::HandOff(name) => graph
                    .sequences
                    .get(name)
                    .and_then(|seq| seq.first_step().map(|s| (seq, s))),
                Target::End(_) => None,
            };
            stack.extend(next);
        }
    }

    for sequence in graph.sequences.values() {
        for step in &sequence.steps {
            if !reached.contains(&(sequence.name(), step.id())) {
                warn!(sequence = %sequence.name(), step = %step.id(), "Step is unreachable from the entry sequence");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::ChoiceSet;
    use crate::step::{AnswerKind, Transition};

    fn number(id: &str) -> StepDefinition {
        StepDefinition::new(id, format!("{}?", id), AnswerKind::integer())
    }

    #[test]
    fn test_next_after_and_exhaustion() {
        let graph = SequenceGraph::builder("main")
            .sequence(
                SubSequence::new("main")
                    .step(number("a").then(Target::Next))
                    .step(number("b").then(Target::Next)),
            )
            .build()
            .unwrap();
        let main = SequenceName::new("main");

        match graph.resolve(&main, &StepId::new("a"), &Target::Next).unwrap() {
            Resolved::Await { step, .. } => assert_eq!(step.id().as_str(), "b"),
            other => panic!("unexpected {:?}", other),
        }
        match graph.resolve(&main, &StepId::new("b"), &Target::Next).unwrap() {
            Resolved::End(ending) => assert_eq!(ending.reason, EndReason::Completed),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hand_off_lands_on_first_step() {
        let graph = SequenceGraph::builder("one")
            .sequence(SubSequence::new("one").step(number("a").then(Target::HandOff("two".into()))))
            .sequence(
                SubSequence::new("two")
                    .step(number("x").then(Target::Next))
                    .step(number("y").then(Target::Next)),
            )
            .build()
            .unwrap();

        let target = Target::HandOff("two".into());
        match graph.resolve(&"one".into(), &StepId::new("a"), &target).unwrap() {
            Resolved::Await { sequence, step } => {
                assert_eq!(sequence.name().as_str(), "two");
                assert_eq!(step.id().as_str(), "x");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_hand_off_fails_at_build() {
        let result = SequenceGraph::builder("one")
            .sequence(SubSequence::new("one").step(number("a").then(Target::HandOff("nowhere".into()))))
            .build();
        assert!(matches!(
            result,
            Err(SequenceError::UnknownSequenceReference { .. })
        ));
    }

    #[test]
    fn test_missing_fallback_fails_at_build() {
        let result = SequenceGraph::builder("one")
            .sequence(SubSequence::new("one").step(
                number("a").transition(Transition::when(|_, _| true, Target::Next)),
            ))
            .build();
        assert!(matches!(
            result,
            Err(SequenceError::MissingFallbackTransition { .. })
        ));
    }

    #[test]
    fn test_forced_cycle_fails_at_build() {
        let choices = || AnswerKind::choice(ChoiceSet::from_labels(["x"]));
        let result = SequenceGraph::builder("one")
            .sequence(
                SubSequence::new("one")
                    .step(StepDefinition::new("a", "a?", choices()).then(Target::Force {
                        step: "b".into(),
                        answer: ForcedAnswer::Choice(0),
                    }))
                    .step(StepDefinition::new("b", "b?", choices()).then(Target::Force {
                        step: "a".into(),
                        answer: ForcedAnswer::Choice(0),
                    })),
            )
            .build();
        assert!(matches!(result, Err(SequenceError::ForcedAnswerCycle { .. })));
    }

    #[test]
    fn test_duplicate_and_empty_sequences() {
        let duplicate = SequenceGraph::builder("one")
            .sequence(SubSequence::new("one").step(number("a").then(Target::Next)))
            .sequence(SubSequence::new("one").step(number("b").then(Target::Next)))
            .build();
        assert!(matches!(duplicate, Err(SequenceError::DuplicateSequence(_))));

        let empty = SequenceGraph::builder("one").sequence(SubSequence::new("one")).build();
        assert!(matches!(empty, Err(SequenceError::EmptySequence(_))));

        let missing = SequenceGraph::builder("one")
            .sequence(SubSequence::new("two").step(number("a").then(Target::Next)))
            .build();
        assert!(matches!(missing, Err(SequenceError::MissingEntry(_))));
    }
}
