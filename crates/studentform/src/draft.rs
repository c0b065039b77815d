//! Local draft persistence.
//!
//! A draft is one JSON object keyed by field id, holding strings for text
//! inputs and booleans for checkboxes. It lives under a single reserved key
//! in a [`DraftStore`]. Failures to read or write drafts are logged and
//! otherwise ignored.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fields::{FieldId, FieldSet, FieldValue};

/// Serialized form contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftSnapshot {
    values: BTreeMap<String, FieldValue>,
}

impl DraftSnapshot {
    /// Capture every field that has a value.
    #[must_use]
    pub fn from_fields(fields: &FieldSet) -> Self {
        let values = fields
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.clone()))
            .collect();
        Self { values }
    }

    /// Rebuild a field set. Unknown keys are skipped, checkboxes are only
    /// restored from booleans and text fields only from strings.
    #[must_use]
    pub fn to_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        for (key, value) in &self.values {
            let Ok(field) = key.parse::<FieldId>() else {
                debug!(key = %key, "Skipping unknown draft key");
                continue;
            };
            match (field.is_checkbox(), value) {
                (true, FieldValue::Checked(checked)) => fields.set_checked(field, *checked),
                (false, FieldValue::Text(text)) => fields.set_text(field, text.clone()),
                _ => debug!(field = %field, "Skipping draft value of the wrong type"),
            }
        }
        fields
    }

    /// Parse a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a JSON object of strings and booleans.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Key-value storage for drafts.
pub trait DraftStore: Send + Sync + fmt::Debug {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory [`DraftStore`] with failure injection.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    writes: Mutex<usize>,
}

impl MemoryDraftStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful `put` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        *self.writes.lock().expect("lock poisoned")
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::persistence("storage unavailable"));
        }
        Ok(())
    }
}

impl DraftStore for MemoryDraftStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), value.to_string());
        *self.writes.lock().expect("lock poisoned") += 1;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().expect("lock poisoned").get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().expect("lock poisoned").remove(key);
        Ok(())
    }
}

/// Saves, restores and clears the draft under one key.
#[derive(Debug, Clone)]
pub struct DraftManager {
    store: Arc<dyn DraftStore>,
    key: String,
    last_digest: Arc<Mutex<Option<blake3::Hash>>>,
}

impl DraftManager {
    /// Create a manager writing to `key` in `store`.
    pub fn new(store: Arc<dyn DraftStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            last_digest: Arc::new(Mutex::new(None)),
        }
    }

    /// The reserved key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Save the current fields. Returns whether anything was written; an
    /// unchanged snapshot or a store failure writes nothing.
    pub fn save(&self, fields: &FieldSet) -> bool {
        let json = match DraftSnapshot::from_fields(fields).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize draft");
                return false;
            }
        };

        let digest = blake3::hash(json.as_bytes());
        let mut last = self.last_digest.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(digest) {
            debug!("Draft unchanged, skipping save");
            return false;
        }

        match self.store.put(&self.key, &json) {
            Ok(()) => {
                *last = Some(digest);
                debug!(bytes = json.len(), "Draft saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save draft");
                false
            }
        }
    }

    /// Read the stored draft, if any. Unreadable drafts are treated as absent.
    #[must_use]
    pub fn load(&self) -> Option<DraftSnapshot> {
        let text = match self.store.get(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read draft");
                return None;
            }
        };
        match DraftSnapshot::from_json(&text) {
            Ok(snapshot) => {
                *self.last_digest.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(blake3::hash(text.as_bytes()));
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable draft");
                None
            }
        }
    }

    /// Whether a draft is stored.
    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self.store.get(&self.key), Ok(Some(_)))
    }

    /// Remove the stored draft.
    pub fn clear(&self) {
        *self.last_digest.lock().unwrap_or_else(PoisonError::into_inner) = None;
        match self.store.remove(&self.key) {
            Ok(()) => debug!("Draft cleared"),
            Err(e) => warn!(error = %e, "Failed to clear draft"),
        }
    }
}

/// Trailing-edge debounce for auto-save.
///
/// Each input pushes the deadline out by `delay`; [`Debouncer::poll`] fires
/// once the input has been quiet that long.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Record an input at `now`.
    pub fn on_input(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Whether a save is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Fire immediately if anything is pending.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (Arc<MemoryDraftStore>, DraftManager) {
        let store = Arc::new(MemoryDraftStore::new());
        let manager = DraftManager::new(store.clone(), "uoe_dual_form_data");
        (store, manager)
    }

    #[test]
    fn test_round_trip_preserves_strings_and_checkboxes() {
        let (_, manager) = manager();
        let mut fields = FieldSet::new();
        fields.set_text(FieldId::FullName, r#"Jane "JJ" O'Neil \ Wanjiku"#);
        fields.set_text(FieldId::AdditionalInfo, "line one\nline two\t\u{1F600}");
        fields.set_checked(FieldId::DataConsent, true);
        fields.set_checked(FieldId::DataRights, false);

        assert!(manager.save(&fields));
        let restored = manager.load().unwrap().to_fields();

        assert_eq!(restored, fields);
        assert!(restored.is_checked(FieldId::DataConsent));
        assert!(!restored.is_checked(FieldId::DataRights));
    }

    #[test]
    fn test_stored_as_flat_json_object() {
        let (store, manager) = manager();
        let mut fields = FieldSet::new();
        fields.set_text(FieldId::FullName, "Jane");
        fields.set_checked(FieldId::DataConsent, true);
        manager.save(&fields);

        let raw = store.get("uoe_dual_form_data").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["fullName"], "Jane");
        assert_eq!(json["dataConsent"], true);
    }

    #[test]
    fn test_unknown_and_mistyped_keys_skipped() {
        let snapshot = DraftSnapshot::from_json(
            r#"{"fullName":"Jane","legacyField":"x","dataConsent":"yes","gender":true}"#,
        )
        .unwrap();
        let fields = snapshot.to_fields();

        assert_eq!(fields.text(FieldId::FullName), "Jane");
        assert!(fields.get(FieldId::DataConsent).is_none());
        assert!(fields.get(FieldId::Gender).is_none());
    }

    #[test]
    fn test_identical_snapshot_not_rewritten() {
        let (store, manager) = manager();
        let mut fields = FieldSet::new();
        fields.set_text(FieldId::FullName, "Jane");

        assert!(manager.save(&fields));
        assert!(!manager.save(&fields));
        assert_eq!(store.write_count(), 1);

        fields.set_text(FieldId::FullName, "Janet");
        assert!(manager.save(&fields));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_clear_removes_key() {
        let (_, manager) = manager();
        assert!(!manager.exists());

        let mut fields = FieldSet::new();
        fields.set_text(FieldId::FullName, "Jane");
        manager.save(&fields);
        assert!(manager.exists());

        manager.clear();
        assert!(!manager.exists());
        assert!(manager.load().is_none());

        // Same content is written again after a clear.
        assert!(manager.save(&fields));
    }

    #[test]
    fn test_store_failures_are_not_fatal() {
        let (store, manager) = manager();
        store.set_failing(true);
        let mut fields = FieldSet::new();
        fields.set_text(FieldId::FullName, "Jane");

        assert!(!manager.save(&fields));
        assert!(manager.load().is_none());
        manager.clear();

        store.set_failing(false);
        assert!(manager.save(&fields));
    }

    #[test]
    fn test_corrupt_draft_ignored() {
        let (store, manager) = manager();
        store.put("uoe_dual_form_data", "{not json").unwrap();
        assert!(manager.load().is_none());
    }

    #[test]
    fn test_debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(1000));
        assert!(!debouncer.poll(start));

        debouncer.on_input(start);
        debouncer.on_input(start + Duration::from_millis(600));
        assert!(!debouncer.poll(start + Duration::from_millis(1200)));
        assert!(debouncer.poll(start + Duration::from_millis(1600)));
        assert!(!debouncer.poll(start + Duration::from_millis(1700)));
    }

    #[test]
    fn test_debouncer_flush() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        assert!(!debouncer.flush());
        debouncer.on_input(Instant::now());
        assert!(debouncer.is_pending());
        assert!(debouncer.flush());
        assert!(!debouncer.is_pending());
    }
}
