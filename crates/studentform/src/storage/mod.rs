//! Local `SQLite` store for drafts and submitted documents.
//!
//! [`Storage`] implements both [`DraftStore`] and [`DocumentStore`], so the
//! CLI can run the full submission flow without a remote backend.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, info};

use crate::draft::DraftStore;
use crate::error::{Error, Result};
use crate::store::{DocumentStore, DocumentUpdate, StoreError, StoreResult, INVALID_ARGUMENT};

const MEMORY_PATH: &str = ":memory:";

/// `SQLite`-backed storage.
#[derive(Debug)]
pub struct Storage {
    path: PathBuf,
    conn: Mutex<Connection>,
    sequence: AtomicU64,
}

impl Storage {
    /// Open or create a database at `path`, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self::with_connection(path, conn))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::with_connection(PathBuf::from(MEMORY_PATH), conn))
    }

    fn with_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
            sequence: AtomicU64::new(0),
        }
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document under a generated id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_document(&self, collection: &str, document: &Value) -> Result<String> {
        let body = serde_json::to_string(document)?;
        let now = Utc::now().to_rfc3339();
        let id = self.document_id(collection, &body, &now);

        self.conn().execute(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![collection, id, body, now],
        )?;
        debug!(collection, id = %id, "Inserted document");
        Ok(id)
    }

    /// Create or replace a document with a known id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_document(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let body = serde_json::to_string(document)?;
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body,
                 updated_at = excluded.updated_at",
            params![collection, id, body, now],
        )?;
        Ok(())
    }

    /// Read, transform and write back one document inside an immediate
    /// transaction. Returns the new body.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails, the stored body is not
    /// JSON, or `update` fails. Nothing is written in that case.
    pub fn update_document(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate<'_>,
    ) -> Result<Value> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let current = body.map(|b| serde_json::from_str(&b)).transpose()?;

        let updated = update(current)?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body,
                 updated_at = excluded.updated_at",
            params![collection, id, serde_json::to_string(&updated)?, now],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Read a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored body is not JSON.
    pub fn document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(Error::from))
            .transpose()
    }

    /// Most recent documents in a collection, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a body is not JSON.
    pub fn recent_documents(&self, collection: &str, limit: usize) -> Result<Vec<(String, Value)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents WHERE collection = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![collection, limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row?;
            documents.push((id, serde_json::from_str(&body)?));
        }
        Ok(documents)
    }

    /// Number of documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn document_count(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT collection, COUNT(*) FROM documents GROUP BY collection")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut documents = BTreeMap::new();
        for row in rows {
            let (collection, count) = row?;
            documents.insert(collection, usize::try_from(count).unwrap_or_default());
        }

        let drafts: i64 = conn.query_row("SELECT COUNT(*) FROM drafts", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            documents,
            drafts: usize::try_from(drafts).unwrap_or_default(),
            db_size_bytes,
        })
    }

    fn document_id(&self, collection: &str, body: &str, timestamp: &str) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(collection.as_bytes());
        hasher.update(body.as_bytes());
        hasher.update(timestamp.as_bytes());
        hasher.update(&sequence.to_le_bytes());
        hasher.finalize().to_hex()[..20].to_string()
    }
}

impl DraftStore for Storage {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO drafts (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row("SELECT value FROM drafts WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM drafts WHERE key = ?1", [key])?;
        Ok(())
    }
}

fn unavailable(error: &Error) -> StoreError {
    StoreError::new("unavailable", error.to_string())
}

#[async_trait]
impl DocumentStore for Storage {
    async fn add(&self, collection: &str, document: Value) -> StoreResult<String> {
        self.insert_document(collection, &document)
            .map_err(|e| unavailable(&e))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.document(collection, id).map_err(|e| unavailable(&e))
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> StoreResult<()> {
        self.upsert_document(collection, id, &document)
            .map_err(|e| unavailable(&e))
    }

    async fn count(&self, collection: &str) -> StoreResult<usize> {
        self.document_count(collection).map_err(|e| unavailable(&e))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate<'_>,
    ) -> StoreResult<Value> {
        self.update_document(collection, id, update)
            .map_err(|e| match e {
                Error::DatabaseQuery(_) | Error::Io(_) => unavailable(&e),
                other => StoreError::new(INVALID_ARGUMENT, other.to_string()),
            })
    }
}

/// Statistics about the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Document counts by collection.
    pub documents: BTreeMap<String, usize>,
    /// Number of stored drafts.
    pub drafts: usize,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path(), Path::new(":memory:"));
        assert_eq!(storage.document_count("student_submissions").unwrap(), 0);
    }

    #[test]
    fn test_draft_put_get_remove() {
        let storage = create_test_storage();
        assert!(DraftStore::get(&storage, "k").unwrap().is_none());

        storage.put("k", r#"{"fullName":"a \"b\" \\ c"}"#).unwrap();
        storage.put("k", r#"{"fullName":"second"}"#).unwrap();
        assert_eq!(
            DraftStore::get(&storage, "k").unwrap().as_deref(),
            Some(r#"{"fullName":"second"}"#)
        );

        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert!(DraftStore::get(&storage, "k").unwrap().is_none());
    }

    #[test]
    fn test_insert_generates_distinct_ids() {
        let storage = create_test_storage();
        let a = storage.insert_document("c", &json!({"x": 1})).unwrap();
        let b = storage.insert_document("c", &json!({"x": 1})).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.len(), 20);
        assert_eq!(storage.document("c", &a).unwrap(), Some(json!({"x": 1})));
        assert_eq!(storage.document_count("c").unwrap(), 2);
    }

    #[test]
    fn test_upsert_replaces_body() {
        let storage = create_test_storage();
        storage.upsert_document("s", "2024-03-14", &json!({"n": 1})).unwrap();
        storage.upsert_document("s", "2024-03-14", &json!({"n": 2})).unwrap();

        assert_eq!(storage.document_count("s").unwrap(), 1);
        assert_eq!(
            storage.document("s", "2024-03-14").unwrap(),
            Some(json!({"n": 2}))
        );
    }

    #[test]
    fn test_recent_documents_newest_first() {
        let storage = create_test_storage();
        for n in 0..3 {
            storage.insert_document("c", &json!({ "n": n })).unwrap();
        }

        let recent = storage.recent_documents("c", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].1, json!({"n": 2}));
        assert_eq!(recent[1].1, json!({"n": 1}));
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        storage.insert_document("a", &json!({})).unwrap();
        storage.insert_document("a", &json!({})).unwrap();
        storage.insert_document("b", &json!({})).unwrap();
        storage.put("draft", "{}").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.documents["a"], 2);
        assert_eq!(stats.documents["b"], 1);
        assert_eq!(stats.drafts, 1);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_document_store_contract() {
        let storage = create_test_storage();
        let id = storage.add("student_submissions", json!({"a": 1})).await.unwrap();

        assert_eq!(
            DocumentStore::get(&storage, "student_submissions", &id)
                .await
                .unwrap(),
            Some(json!({"a": 1}))
        );
        assert_eq!(storage.count("student_submissions").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_document_accumulates() {
        let storage = create_test_storage();
        let bump = |current: Option<Value>| -> Result<Value> {
            let n = current.and_then(|doc| doc["n"].as_u64()).unwrap_or(0);
            Ok(json!({ "n": n + 1 }))
        };

        storage.update("submission_stats", "2024-03-14", &bump).await.unwrap();
        let doc = storage.update("submission_stats", "2024-03-14", &bump).await.unwrap();

        assert_eq!(doc, json!({"n": 2}));
        assert_eq!(
            storage.document("submission_stats", "2024-03-14").unwrap(),
            Some(json!({"n": 2}))
        );
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let storage = create_test_storage();
        storage.upsert_document("s", "d", &json!({"n": 1})).unwrap();

        let reject = |_: Option<Value>| -> Result<Value> { Err(Error::stats_update("bad")) };
        assert!(storage.update_document("s", "d", &reject).is_err());
        assert_eq!(storage.document("s", "d").unwrap(), Some(json!({"n": 1})));
    }

    #[test]
    fn test_open_file_based() {
        let db_path = std::env::temp_dir().join(format!("studentform_test_{}.db", std::process::id()));

        let storage = Storage::open(&db_path).unwrap();
        storage.put("k", "v").unwrap();
        assert_eq!(storage.path(), db_path);
        drop(storage);

        let reopened = Storage::open(&db_path).unwrap();
        assert_eq!(DraftStore::get(&reopened, "k").unwrap().as_deref(), Some("v"));
        assert!(reopened.stats().unwrap().db_size_bytes > 0);

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("studentform_test_{}", std::process::id()));
        let nested_path = root.join("nested/studentform.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
