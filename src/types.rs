//! Common type definitions used throughout the survey library
//!
//! Conversation ids are supplied by the transport and stay opaque. Step ids and
//! sequence names are chosen by whoever builds a [`SequenceGraph`](crate::SequenceGraph),
//! so they are string newtypes rather than random UUIDs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a new random ConversationId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for ConversationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Identifier of a step, unique within its sub-sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Name of a sub-sequence within a sequence graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceName(String);

impl SequenceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SequenceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SequenceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for SequenceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_creation() {
        let id1 = ConversationId::new();
        let id2 = ConversationId::new();
        assert_ne!(id1, id2, "ConversationIds should be unique");
    }

    #[test]
    fn test_conversation_id_is_opaque_string() {
        let id = ConversationId::from("teams:19:abc");
        assert_eq!(id.as_str(), "teams:19:abc");
        assert_eq!(format!("{}", id), "teams:19:abc");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let step = StepId::new("zip_code");
        assert_eq!(serde_json::to_string(&step).unwrap(), "\"zip_code\"");

        let name: SequenceName = serde_json::from_str("\"intake\"").unwrap();
        assert_eq!(name, SequenceName::from("intake"));

        let id = ConversationId::from("c-1");
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_conversation_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ConversationId::from(uuid);
        assert_eq!(id.as_str(), uuid.to_string());
    }
}
