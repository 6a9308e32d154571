//! In-memory knowledge base store.
//!
//! The store holds one immutable [`Snapshot`] behind an `Arc`. Readers clone the
//! `Arc` and work on it without holding any lock; a load builds a complete new
//! snapshot off to the side and publishes it with a single pointer swap. A reader
//! therefore sees either the old snapshot in full or the new one in full.

use crate::error::{AppError, Result};
use crate::knowledge::types::{compute_source_version, MethodEntries, MethodRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Immutable, fully populated view of the knowledge base at one point in time.
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: MethodEntries,
    index: HashMap<String, usize>,
    last_updated: Option<DateTime<Utc>>,
    source_version: Option<String>,
}

impl Snapshot {
    fn build(
        entries: MethodEntries,
        last_updated: DateTime<Utc>,
        source_version: String,
    ) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(idx, (key, _))| (key.clone(), idx))
            .collect();

        Self {
            entries,
            index,
            last_updated: Some(last_updated),
            source_version: Some(source_version),
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, key: &str) -> Option<&MethodRecord> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[(String, MethodRecord)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once any load has been published.
    pub fn is_loaded(&self) -> bool {
        self.last_updated.is_some()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn source_version(&self) -> Option<&str> {
        self.source_version.as_deref()
    }
}

/// Store status as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub is_loaded: bool,
    pub method_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub source_version: Option<String>,
    pub methods_with_parameters: usize,
    pub methods_with_examples: usize,
}

/// Single shared knowledge base instance. Passed around as `Arc<KnowledgeStore>`.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    current: RwLock<Arc<Snapshot>>,
}

impl KnowledgeStore {
    /// Create an empty, not yet loaded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish a complete new mapping, stamped with the current time.
    ///
    /// On a schema violation nothing is published and the error lists every
    /// offending key.
    pub fn load(&self, entries: MethodEntries) -> Result<Arc<Snapshot>> {
        self.publish_validated(entries, Utc::now())
    }

    /// Publish a mapping read from the warm-start cache, keeping its original timestamp.
    pub fn restore(
        &self,
        entries: MethodEntries,
        last_updated: DateTime<Utc>,
    ) -> Result<Arc<Snapshot>> {
        self.publish_validated(entries, last_updated)
    }

    /// Current snapshot. Cheap: one `Arc` clone under a short read lock.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn status(&self) -> StoreStatus {
        let snapshot = self.snapshot();
        let entries = snapshot.entries();

        StoreStatus {
            is_loaded: snapshot.is_loaded(),
            method_count: snapshot.len(),
            last_updated: snapshot.last_updated(),
            source_version: snapshot.source_version().map(str::to_string),
            methods_with_parameters: entries
                .iter()
                .filter(|(_, r)| !r.parameters.is_empty())
                .count(),
            methods_with_examples: entries
                .iter()
                .filter(|(_, r)| !r.example.trim().is_empty())
                .count(),
        }
    }

    fn publish_validated(
        &self,
        entries: MethodEntries,
        last_updated: DateTime<Utc>,
    ) -> Result<Arc<Snapshot>> {
        validate_entries(&entries)?;

        let source_version = compute_source_version(&entries);
        let snapshot = Arc::new(Snapshot::build(entries, last_updated, source_version));

        {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::clone(&snapshot);
        }

        metrics::gauge!("knowledge_base_methods").set(snapshot.len() as f64);
        tracing::info!(
            methods = snapshot.len(),
            version = snapshot.source_version().unwrap_or_default(),
            "Knowledge base snapshot published"
        );

        Ok(snapshot)
    }
}

/// Reject the whole mapping if any record is invalid, collecting every bad key.
fn validate_entries(entries: &[(String, MethodRecord)]) -> Result<()> {
    if entries.is_empty() {
        return Err(AppError::SchemaError(Vec::new()));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut offending = Vec::new();

    for (key, record) in entries {
        let mut problems = record.schema_violations();
        if key.trim().is_empty() {
            problems.push("method key is empty".to_string());
        }
        if !seen.insert(key.as_str()) {
            problems.push("duplicate method key".to_string());
        }

        if !problems.is_empty() {
            tracing::warn!(key = %key, problems = ?problems, "Rejecting invalid method record");
            if !offending.contains(key) {
                offending.push(key.clone());
            }
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(AppError::SchemaError(offending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::ParameterSpec;

    fn record(name: &str, endpoint: &str, method: &str) -> MethodRecord {
        MethodRecord {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            http_method: method.to_string(),
            description: format!("{} description", name),
            parameters: Vec::new(),
            example: String::new(),
            response: String::new(),
        }
    }

    #[test]
    fn test_new_store_is_not_loaded() {
        let store = KnowledgeStore::new();
        let status = store.status();

        assert!(!status.is_loaded);
        assert_eq!(status.method_count, 0);
        assert!(status.last_updated.is_none());
        assert!(status.source_version.is_none());
    }

    #[test]
    fn test_load_publishes_snapshot() {
        let store = KnowledgeStore::new();
        store
            .load(vec![
                ("b".to_string(), record("B", "/b", "GET")),
                ("a".to_string(), record("A", "/a", "POST")),
            ])
            .unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entries()[0].0, "b");
        assert_eq!(snapshot.get("a").unwrap().http_method, "POST");
        assert!(snapshot.get("A").is_none());
    }

    #[test]
    fn test_invalid_load_keeps_previous_snapshot() {
        let store = KnowledgeStore::new();
        store
            .load(vec![("good".to_string(), record("Good", "/good", "GET"))])
            .unwrap();
        let before = store.status();

        let err = store
            .load(vec![
                ("ok".to_string(), record("Ok", "/ok", "GET")),
                ("noPath".to_string(), record("No path", "", "GET")),
                ("badVerb".to_string(), record("Bad verb", "/x", "FETCH")),
            ])
            .unwrap_err();

        match err {
            AppError::SchemaError(keys) => assert_eq!(keys, vec!["noPath", "badVerb"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.status(), before);
        assert!(store.snapshot().get("good").is_some());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let store = KnowledgeStore::new();
        let err = store
            .load(vec![
                ("dup".to_string(), record("One", "/one", "GET")),
                ("dup".to_string(), record("Two", "/two", "GET")),
            ])
            .unwrap_err();

        assert!(matches!(err, AppError::SchemaError(keys) if keys == vec!["dup"]));
        assert!(!store.status().is_loaded);
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let store = KnowledgeStore::new();
        let err = store.load(Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::SchemaError(keys) if keys.is_empty()));
    }

    #[test]
    fn test_restore_keeps_timestamp() {
        let store = KnowledgeStore::new();
        let stamp = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        store
            .restore(vec![("a".to_string(), record("A", "/a", "GET"))], stamp)
            .unwrap();

        assert_eq!(store.status().last_updated, Some(stamp));
    }

    #[test]
    fn test_status_statistics() {
        let mut with_params = record("P", "/p", "POST");
        with_params.parameters.push(ParameterSpec {
            name: "id".to_string(),
            param_type: "integer".to_string(),
            description: String::new(),
            required: true,
        });
        let mut with_example = record("E", "/e", "POST");
        with_example.example = "{\"id\": 1}".to_string();

        let store = KnowledgeStore::new();
        store
            .load(vec![
                ("p".to_string(), with_params),
                ("e".to_string(), with_example),
                ("plain".to_string(), record("Plain", "/plain", "GET")),
            ])
            .unwrap();

        let status = store.status();
        assert_eq!(status.method_count, 3);
        assert_eq!(status.methods_with_parameters, 1);
        assert_eq!(status.methods_with_examples, 1);
    }

    #[test]
    fn test_old_snapshot_survives_swap() {
        let store = KnowledgeStore::new();
        store
            .load(vec![("old".to_string(), record("Old", "/old", "GET"))])
            .unwrap();

        let held = store.snapshot();
        store
            .load(vec![("new".to_string(), record("New", "/new", "GET"))])
            .unwrap();

        assert!(held.get("old").is_some());
        assert!(held.get("new").is_none());
        assert!(store.snapshot().get("new").is_some());
    }
}
