//! Outbound payloads handed to the transport
//!
//! The engine never renders anything itself. It hands the transport plain text
//! or a prompt made of text, an ordered list of choice labels, and retry text.

use serde::{Deserialize, Serialize};

/// A question put to the respondent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Question text
    pub text: String,
    /// Choice labels in presentation order (empty for free-form answers)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Text to show if the answer is not understood
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_text: Option<String>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            retry_text: None,
        }
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_retry_text(mut self, retry_text: Option<String>) -> Self {
        self.retry_text = retry_text;
        self
    }
}

/// One message the engine wants sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Informational text that expects no answer
    Text { text: String },
    /// A question awaiting an answer
    Prompt(Prompt),
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The displayable text of either kind
    pub fn content(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Prompt(prompt) => &prompt.text,
        }
    }

    pub fn as_prompt(&self) -> Option<&Prompt> {
        match self {
            Self::Prompt(prompt) => Some(prompt),
            Self::Text { .. } => None,
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::Prompt(_))
    }
}

impl From<Prompt> for OutboundMessage {
    fn from(prompt: Prompt) -> Self {
        Self::Prompt(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("Who do you need insurance for?")
            .with_choices(vec!["Just Me".to_string(), "Me & Spouse".to_string()])
            .with_retry_text(Some("Try typing the number of one of the choices.".to_string()));

        assert_eq!(prompt.choices.len(), 2);
        assert!(prompt.retry_text.is_some());
    }

    #[test]
    fn test_outbound_content() {
        let text = OutboundMessage::text("Hello!");
        let prompt: OutboundMessage = Prompt::new("What's your zip code?").into();

        assert_eq!(text.content(), "Hello!");
        assert!(!text.is_prompt());
        assert_eq!(prompt.content(), "What's your zip code?");
        assert!(prompt.as_prompt().is_some());
    }

    #[test]
    fn test_outbound_serialization() {
        let msg = OutboundMessage::text("Looking good, Albany!");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "Looking good, Albany!");

        let prompt = OutboundMessage::Prompt(Prompt::new("How many?"));
        let json = serde_json::to_string(&prompt).unwrap();
        let deserialized: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(prompt, deserialized);
    }
}
