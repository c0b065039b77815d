//! Remote document store contract.
//!
//! Submissions and daily aggregates are written as JSON documents into named
//! collections. Store failures carry a string error code which is mapped to a
//! [`FailureKind`] for user-facing messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{self, FailureKind, SubmissionFailure};

/// Error code for a document an update could not be applied to.
pub const INVALID_ARGUMENT: &str = "invalid-argument";

/// Error returned by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct StoreError {
    /// Backend error code, e.g. `permission-denied`.
    pub code: String,
    /// Backend message.
    pub message: String,
}

impl StoreError {
    /// Create an error with the given code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classified failure kind.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        FailureKind::from_code(&self.code)
    }

    /// Convert into a submission failure for `collection`.
    #[must_use]
    pub fn into_submission_failure(self, collection: &str) -> SubmissionFailure {
        SubmissionFailure::new(self.kind(), collection, self.message)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Computes a document's new body from its current one (`None` if absent).
pub type DocumentUpdate<'a> = &'a (dyn Fn(Option<Value>) -> error::Result<Value> + Send + Sync);

/// A collection-oriented JSON document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Add a new document and return its id.
    async fn add(&self, collection: &str, document: Value) -> StoreResult<String>;

    /// Read a document by id.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace a document with a known id.
    async fn set(&self, collection: &str, id: &str, document: Value) -> StoreResult<()>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> StoreResult<usize>;

    /// Read a document, apply `update` and write the result, with no other
    /// write to the document in between. Returns the new body.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate<'_>,
    ) -> StoreResult<Value>;
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, HashMap<String, Value>>,
    failures: HashMap<String, StoreError>,
    next_id: u64,
}

/// In-memory [`DocumentStore`] with per-collection failure injection and
/// optional latency.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every operation on `collection` fail with `error`.
    pub fn fail_collection(&self, collection: impl Into<String>, error: StoreError) {
        self.state
            .lock()
            .expect("lock poisoned")
            .failures
            .insert(collection.into(), error);
    }

    /// Stop failing operations on `collection`.
    pub fn heal_collection(&self, collection: &str) {
        self.state
            .lock()
            .expect("lock poisoned")
            .failures
            .remove(collection);
    }

    /// All documents in a collection, in no particular order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .expect("lock poisoned")
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(state: &MemoryState, collection: &str) -> StoreResult<()> {
        match state.failures.get(collection) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, collection: &str, document: Value) -> StoreResult<String> {
        self.delay().await;
        let mut state = self.state.lock().expect("lock poisoned");
        Self::check(&state, collection)?;
        state.next_id += 1;
        let id = format!("doc-{:06}", state.next_id);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.delay().await;
        let state = self.state.lock().expect("lock poisoned");
        Self::check(&state, collection)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> StoreResult<()> {
        self.delay().await;
        let mut state = self.state.lock().expect("lock poisoned");
        Self::check(&state, collection)?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        self.delay().await;
        let state = self.state.lock().expect("lock poisoned");
        Self::check(&state, collection)?;
        Ok(state.collections.get(collection).map_or(0, HashMap::len))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate<'_>,
    ) -> StoreResult<Value> {
        self.delay().await;
        let mut state = self.state.lock().expect("lock poisoned");
        Self::check(&state, collection)?;
        let current = state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();
        let updated =
            update(current).map_err(|e| StoreError::new(INVALID_ARGUMENT, e.to_string()))?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_add_and_get() {
        let store = MemoryDocumentStore::new();
        let id = store.add("student_submissions", json!({"a": 1})).await.unwrap();

        let doc = store.get("student_submissions", &id).await.unwrap();
        assert_eq!(doc, Some(json!({"a": 1})));
        assert_eq!(store.count("student_submissions").await.unwrap(), 1);
        assert_eq!(store.count("media_submissions").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let store = MemoryDocumentStore::new();
        store.set("stats", "2024-03-14", json!({"n": 1})).await.unwrap();
        store.set("stats", "2024-03-14", json!({"n": 2})).await.unwrap();

        assert_eq!(
            store.get("stats", "2024-03-14").await.unwrap(),
            Some(json!({"n": 2}))
        );
    }

    #[tokio::test]
    async fn test_failure_injection_is_per_collection() {
        let store = MemoryDocumentStore::new();
        store.fail_collection(
            "student_submissions",
            StoreError::new("permission-denied", "rules rejected write"),
        );

        let err = store
            .add("student_submissions", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::PermissionDenied);
        assert!(store.add("media_submissions", json!({})).await.is_ok());

        store.heal_collection("student_submissions");
        assert!(store.add("student_submissions", json!({})).await.is_ok());
    }

    #[test]
    fn test_into_submission_failure() {
        let failure = StoreError::new("unavailable", "offline")
            .into_submission_failure("student_submissions");
        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert_eq!(failure.collection, "student_submissions");
    }

    fn bump(current: Option<Value>) -> error::Result<Value> {
        let n = current.and_then(|doc| doc["n"].as_u64()).unwrap_or(0);
        Ok(json!({ "n": n + 1 }))
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = MemoryDocumentStore::new().with_latency(Duration::from_millis(20));

        let (a, b) = tokio::join!(
            store.update("stats", "2024-03-14", &bump),
            store.update("stats", "2024-03-14", &bump)
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(
            store.get("stats", "2024-03-14").await.unwrap(),
            Some(json!({"n": 2}))
        );
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document() {
        let store = MemoryDocumentStore::new();
        store.set("stats", "d", json!({"n": 5})).await.unwrap();

        let reject = |_: Option<Value>| -> error::Result<Value> {
            Err(error::Error::stats_update("malformed"))
        };
        let err = store.update("stats", "d", &reject).await.unwrap_err();

        assert_eq!(err.code, INVALID_ARGUMENT);
        assert_eq!(store.get("stats", "d").await.unwrap(), Some(json!({"n": 5})));
    }

    #[tokio::test]
    async fn test_latency() {
        let store = MemoryDocumentStore::new().with_latency(Duration::from_millis(20));
        let start = tokio::time::Instant::now();
        store.add("c", json!({})).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
