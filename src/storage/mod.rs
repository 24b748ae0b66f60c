//! Session storage backends
//!
//! This module provides trait-based abstraction for session storage, keyed by
//! conversation id. The engine reads once and writes once per turn.

use crate::error::StorageError;
use crate::session::SessionState;
use crate::types::ConversationId;
use async_trait::async_trait;

pub mod memory;

/// Trait for session storage backends
///
/// Implementations only need to provide keyed get/put/delete; the engine never
/// reads or writes the same conversation from two turns at once.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the state for a conversation
    ///
    /// # Returns
    ///
    /// The state if found, None if not found, or a storage error
    async fn get(&self, id: &ConversationId) -> Result<Option<SessionState>, StorageError>;

    /// Insert or replace the state for a conversation
    async fn put(&self, state: SessionState) -> Result<(), StorageError>;

    /// Delete the state for a conversation
    ///
    /// # Returns
    ///
    /// Ok on success, `StorageError::NotFound` if nothing was stored
    async fn delete(&self, id: &ConversationId) -> Result<(), StorageError>;

    /// List all conversation ids in the store
    async fn list(&self) -> Result<Vec<ConversationId>, StorageError>;

    /// Check if a conversation has stored state
    async fn exists(&self, id: &ConversationId) -> Result<bool, StorageError> {
        Ok(self.get(id).await?.is_some())
    }
}
