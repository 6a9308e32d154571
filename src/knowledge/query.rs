//! Read-only queries over the current knowledge base snapshot.
//!
//! Every operation takes one snapshot up front and answers entirely from it, so a
//! refresh completing mid-query cannot mix records from two snapshots.

use crate::error::{AppError, Result};
use crate::knowledge::store::KnowledgeStore;
use crate::knowledge::types::MethodRecord;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Group name for methods whose endpoint has no resource segment.
pub const OTHER_GROUP: &str = "other";

/// Stateless query surface over a shared store.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<KnowledgeStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Case-insensitive substring search over name, endpoint and description.
    ///
    /// Results keep insertion order. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<(String, MethodRecord)> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let snapshot = self.store.snapshot();
        snapshot
            .entries()
            .iter()
            .filter(|(_, record)| record.matches(&needle))
            .cloned()
            .collect()
    }

    /// Like [`search`](Self::search) but keeps at most `limit` results. Returns
    /// the total match count alongside.
    pub fn search_limited(&self, query: &str, limit: usize) -> (usize, Vec<(String, MethodRecord)>) {
        let mut results = self.search(query);
        let total = results.len();
        results.truncate(limit);
        (total, results)
    }

    /// Exact, case-sensitive lookup by method key.
    pub fn get_details(&self, key: &str) -> Result<MethodRecord> {
        self.store
            .snapshot()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFoundError(key.to_string()))
    }

    /// Every (key, record) pair in insertion order.
    pub fn list_all(&self) -> Vec<(String, MethodRecord)> {
        self.store.snapshot().entries().to_vec()
    }

    /// Method keys grouped by resource (see [`resource_of`]). Groups and keys are sorted.
    pub fn group_by_resource(&self) -> BTreeMap<String, Vec<String>> {
        let snapshot = self.store.snapshot();
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (key, record) in snapshot.entries() {
            groups
                .entry(resource_of(&record.endpoint))
                .or_default()
                .push(key.clone());
        }
        for keys in groups.values_mut() {
            keys.sort();
        }

        groups
    }
}

/// Resource segment of an endpoint path: the first segment after an optional
/// leading `api` and any version segments (`v1`, `v2`, ...).
///
/// `/api/v1/door/open` -> `door`, `/status` -> `status`, `/api/v2` -> `other`.
pub fn resource_of(endpoint: &str) -> String {
    endpoint
        .split('/')
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .find(|(idx, segment)| !(*idx == 0 && *segment == "api") && !is_version_segment(segment))
        .map(|(_, segment)| segment.to_lowercase())
        .unwrap_or_else(|| OTHER_GROUP.to_string())
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
