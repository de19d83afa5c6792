//! Per-session conversation store with pluggable backends.
//!
//! A store owns all sessions; a session has no lifetime independent of its
//! store. The in-memory reference implementation initializes both history
//! and the variable bag empty on first reference to a session id.

use crate::error::{OrchestratorError, Result};
use crate::types::Turn;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Abstract session store. Implementations must tolerate interleaved
/// reads/writes across distinct session ids; ordering within a single
/// session is the caller's responsibility (see `ContextManager`).
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get_history(&self, session_id: &str) -> Vec<Turn>;
    async fn append_history(&self, session_id: &str, turn: Turn);
    async fn get_var(&self, session_id: &str, key: &str) -> Option<Value>;
    async fn set_var(&self, session_id: &str, key: &str, value: Value);
    async fn clear(&self, session_id: &str);
}

#[derive(Default)]
struct SessionData {
    history: Vec<Turn>,
    vars: HashMap<String, Value>,
}

/// Process-local, in-memory `ContextStore`. The default for tests and for
/// any orchestrator not wired to an external persistence backend.
#[derive(Default)]
pub struct InMemoryContextStore {
    sessions: Mutex<HashMap<String, SessionData>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get_history(&self, session_id: &str) -> Vec<Turn> {
        let sessions = self.sessions.lock().await;
        // Snapshot copy — never a live alias into the store's internals.
        sessions.get(session_id).map(|s| s.history.clone()).unwrap_or_default()
    }

    async fn append_history(&self, session_id: &str, turn: Turn) {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.to_string()).or_default().history.push(turn);
    }

    async fn get_var(&self, session_id: &str, key: &str) -> Option<Value> {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).and_then(|s| s.vars.get(key)).cloned()
    }

    async fn set_var(&self, session_id: &str, key: &str, value: Value) {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(session_id.to_string()).or_default().vars.insert(key.to_string(), value);
    }

    async fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(session_id);
    }
}

/// Wraps a store for one fixed session id. This is what agents and the
/// orchestrator actually hold — there is no global "current session".
#[derive(Clone)]
pub struct ContextManager {
    store: Arc<dyn ContextStore>,
    session_id: String,
}

impl ContextManager {
    pub fn new(store: Arc<dyn ContextStore>, session_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(OrchestratorError::Session("session id must not be empty".to_string()));
        }
        Ok(Self { store, session_id })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn add_message(&self, role: crate::types::Role, content: impl Into<String>) {
        self.store.append_history(&self.session_id, Turn::new(role, content)).await;
    }

    /// Returns the last `limit` turns, or the full history if `limit` is `None`.
    pub async fn get_history(&self, limit: Option<usize>) -> Vec<Turn> {
        let history = self.store.get_history(&self.session_id).await;
        match limit {
            Some(n) if n < history.len() => history[history.len() - n..].to_vec(),
            _ => history,
        }
    }

    pub async fn get_var(&self, key: &str) -> Option<Value> {
        self.store.get_var(&self.session_id, key).await
    }

    pub async fn get_var_or(&self, key: &str, default: Value) -> Value {
        self.get_var(key).await.unwrap_or(default)
    }

    pub async fn set_var(&self, key: &str, value: Value) {
        self.store.set_var(&self.session_id, key, value).await;
    }

    pub async fn clear(&self) {
        self.store.clear(&self.session_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn rejects_empty_session_id() {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        assert!(ContextManager::new(store, "").is_err());
    }

    #[tokio::test]
    async fn history_is_append_ordered_and_snapshotted() {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let mgr = ContextManager::new(store, "sess-1").unwrap();

        mgr.add_message(crate::types::Role::User, "hi").await;
        mgr.add_message(crate::types::Role::Assistant, "hello").await;

        let history = mgr.get_history(None).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "hello");

        let limited = mgr.get_history(Some(1)).await;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].content, "hello");
    }

    #[tokio::test]
    async fn vars_default_and_round_trip() {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let mgr = ContextManager::new(store, "sess-2").unwrap();

        assert_eq!(mgr.get_var("missing").await, None);
        assert_eq!(mgr.get_var_or("missing", json!(0)).await, json!(0));

        mgr.set_var("count", json!(5)).await;
        assert_eq!(mgr.get_var("count").await, Some(json!(5)));
    }

    #[tokio::test]
    async fn clear_removes_session_state() {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let mgr = ContextManager::new(store, "sess-3").unwrap();
        mgr.add_message(crate::types::Role::User, "hi").await;
        mgr.set_var("k", json!(true)).await;

        mgr.clear().await;

        assert!(mgr.get_history(None).await.is_empty());
        assert_eq!(mgr.get_var("k").await, None);
    }
}
