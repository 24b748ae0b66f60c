//! In-memory session storage implementation
//!
//! This module provides a thread-safe, in-memory implementation of the SessionStore trait
//! using a HashMap protected by an async RwLock.

use crate::error::StorageError;
use crate::session::SessionState;
use crate::storage::SessionStore;
use crate::types::ConversationId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// In-memory session storage implementation
///
/// State lives in a HashMap behind an async RwLock and is shared between clones.
/// Suitable for development, testing, and single-instance deployments.
///
/// # Examples
///
/// ```
/// use survey::{ConversationId, InMemorySessionStore, SessionState};
/// use survey::storage::SessionStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemorySessionStore::new();
///     let id = ConversationId::from("conv-1");
///     store.put(SessionState::new(id.clone())).await?;
///
///     let retrieved = store.get(&id).await?;
///     assert!(retrieved.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<ConversationId, SessionState>>>,
}

impl InMemorySessionStore {
    /// Create a new in-memory session store
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of conversations currently stored
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Clear all state from the store
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &ConversationId) -> Result<Option<SessionState>, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn put(&self, state: SessionState) -> Result<(), StorageError> {
        trace!(conversation_id = %state.conversation_id, "Storing session state");
        let mut sessions = self.sessions.write().await;
        sessions.insert(state.conversation_id.clone(), state);
        Ok(())
    }

    async fn delete(&self, id: &ConversationId) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;

        if sessions.remove(id).is_none() {
            return Err(StorageError::NotFound(format!(
                "Session state for conversation {} not found",
                id
            )));
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationId>, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }

    async fn exists(&self, id: &ConversationId) -> Result<bool, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WizardState;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemorySessionStore::new();
        let id = ConversationId::new();

        store.put(SessionState::new(id.clone())).await.unwrap();

        let retrieved = store.get(&id).await.unwrap();
        assert_eq!(retrieved.unwrap().conversation_id, id);
    }

    #[tokio::test]
    async fn test_get_missing_state() {
        let store = InMemorySessionStore::new();
        let retrieved = store.get(&ConversationId::new()).await.unwrap();
        assert!(retrieved.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_state() {
        let store = InMemorySessionStore::new();
        let id = ConversationId::from("conv-1");
        let mut state = SessionState::new(id.clone());
        store.put(state.clone()).await.unwrap();

        state.await_step("intake".into(), "zip_code".into());
        store.put(state).await.unwrap();

        let retrieved = store.get(&id).await.unwrap().unwrap();
        assert!(matches!(retrieved.state, WizardState::AwaitingAnswer { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemorySessionStore::new();
        let id = ConversationId::new();
        store.put(SessionState::new(id.clone())).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());

        let result = store.delete(&id).await;
        assert!(matches!(result.unwrap_err(), StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_exists() {
        let store = InMemorySessionStore::new();
        let ids: Vec<ConversationId> = (0..3).map(|_| ConversationId::new()).collect();
        for id in &ids {
            store.put(SessionState::new(id.clone())).await.unwrap();
        }

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 3);
        for id in &ids {
            assert!(list.contains(id));
            assert!(store.exists(id).await.unwrap());
        }
        assert!(!store.exists(&ConversationId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_len_is_empty_and_clear() {
        let store = InMemorySessionStore::new();
        assert!(store.is_empty().await);

        store.put(SessionState::new(ConversationId::new())).await.unwrap();
        store.put(SessionState::new(ConversationId::new())).await.unwrap();
        assert_eq!(store.len().await, 2);

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = InMemorySessionStore::new();
        let store_clone1 = store.clone();
        let store_clone2 = store.clone();

        let handle1 = tokio::spawn(async move {
            for _ in 0..10 {
                store_clone1
                    .put(SessionState::new(ConversationId::new()))
                    .await
                    .unwrap();
            }
        });

        let handle2 = tokio::spawn(async move {
            for _ in 0..10 {
                store_clone2
                    .put(SessionState::new(ConversationId::new()))
                    .await
                    .unwrap();
            }
        });

        handle1.await.unwrap();
        handle2.await.unwrap();

        assert_eq!(store.len().await, 20);
    }
}
