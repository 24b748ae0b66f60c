//! Fixed choice sets and recognition of a choice from raw text
//!
//! Recognition tries, in order: a 1-based choice number, an exact
//! (case-insensitive) label or synonym, then a whole-word search for labels and
//! synonyms inside the text using Aho-Corasick. The search only succeeds when
//! every hit belongs to the same choice.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Label shown to the respondent and stored when chosen
    pub value: String,
    /// Other phrasings that select this choice
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Choice {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.value.as_str()).chain(self.synonyms.iter().map(String::as_str))
    }
}

/// A recognized choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundChoice {
    /// Zero-based position in the choice set
    pub index: usize,
    /// The choice label, verbatim
    pub value: String,
}

/// Immutable, ordered set of choices with a prebuilt matcher
#[derive(Debug, Clone)]
pub struct ChoiceSet {
    choices: Vec<Choice>,
    matcher: Option<AhoCorasick>,
    /// Maps pattern index to choice index
    term_to_choice: Vec<usize>,
}

impl ChoiceSet {
    pub fn new(choices: Vec<Choice>) -> Self {
        let mut terms: Vec<String> = Vec::new();
        let mut term_to_choice = Vec::new();
        for (choice_idx, choice) in choices.iter().enumerate() {
            for term in choice.terms() {
                let term = term.trim().to_lowercase();
                if !term.is_empty() {
                    terms.push(term);
                    term_to_choice.push(choice_idx);
                }
            }
        }

        let matcher = if terms.is_empty() {
            None
        } else {
            match AhoCorasickBuilder::new()
                .ascii_case_insensitive(true)
                .build(&terms)
            {
                Ok(ac) => Some(ac),
                Err(e) => {
                    warn!(error = %e, "Failed to build choice matcher, falling back to exact matching");
                    None
                }
            }
        };

        Self {
            choices,
            matcher,
            term_to_choice,
        }
    }

    /// Build a set from plain labels without synonyms
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(labels.into_iter().map(Choice::new).collect())
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Choice> {
        self.choices.get(index)
    }

    /// Labels in presentation order
    pub fn labels(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.value.clone()).collect()
    }

    /// Build the answer for a known index, as if the respondent had picked it
    pub fn found(&self, index: usize) -> Option<FoundChoice> {
        self.choices.get(index).map(|choice| FoundChoice {
            index,
            value: choice.value.clone(),
        })
    }

    /// Recognize a choice in raw respondent text
    pub fn recognize(&self, raw: &str) -> Option<FoundChoice> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(number) = text.trim_end_matches('.').parse::<usize>() {
            if (1..=self.choices.len()).contains(&number) {
                trace!(number, "Choice recognized by number");
                return self.found(number - 1);
            }
        }

        let lowered = text.to_lowercase();
        if let Some(index) = self
            .choices
            .iter()
            .position(|c| c.terms().any(|t| t.trim().to_lowercase() == lowered))
        {
            trace!(index, "Choice recognized by exact term");
            return self.found(index);
        }

        let ac = self.matcher.as_ref()?;
        let mut hits = BTreeSet::new();
        for mat in ac.find_overlapping_iter(&lowered) {
            if is_word_bounded(&lowered, mat.start(), mat.end()) {
                if let Some(&choice_idx) = self.term_to_choice.get(mat.pattern().as_usize()) {
                    hits.insert(choice_idx);
                }
            }
        }

        match hits.len() {
            1 => {
                let index = *hits.iter().next()?;
                trace!(index, "Choice recognized by contained term");
                self.found(index)
            }
            0 => None,
            _ => {
                trace!(candidates = ?hits, "Ambiguous choice");
                None
            }
        }
    }
}

impl PartialEq for ChoiceSet {
    fn eq(&self, other: &Self) -> bool {
        self.choices == other.choices
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
