//! `SQLite` schema for the local store.

/// Drafts, one row per reserved key.
pub const CREATE_DRAFTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS drafts (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// JSON documents grouped by collection.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)
";

/// Key-value pairs such as the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Index for listing a collection newest first. Added in version 2.
pub const CREATE_DOCUMENTS_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(collection, created_at DESC)
";

/// Base schema statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DRAFTS_TABLE,
    CREATE_DOCUMENTS_TABLE,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_keyed_by_collection_and_id() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("PRIMARY KEY (collection, id)"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("body TEXT NOT NULL"));
    }

    #[test]
    fn test_drafts_keyed_by_key() {
        assert!(CREATE_DRAFTS_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_DRAFTS_TABLE.contains("updated_at TEXT NOT NULL"));
    }
}
