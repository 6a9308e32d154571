//! Warm-start cache for the knowledge base.
//!
//! After every successful refresh the published snapshot is written to disk. On
//! startup the cache is read back so queries can be answered before the first
//! live refresh finishes. The cache is advisory: a live fetch always replaces it.

use crate::error::{AppError, Result};
use crate::knowledge::{compute_source_version, entries_from_value, entries_to_value, MethodEntries, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Cache file format version. Increment when format changes.
const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    format_version: u32,
    last_updated: DateTime<Utc>,
    /// Digest of `methods`, checked on load to detect a damaged file
    source_version: String,
    methods: Value,
}

/// Knowledge base contents read back from the cache.
pub struct CachedKnowledgeBase {
    pub entries: MethodEntries,
    pub last_updated: DateTime<Utc>,
    pub source_version: String,
}

/// Write a snapshot to the cache file.
///
/// The file is written to a sibling temp path first and renamed into place, so a
/// crash mid-write never leaves a truncated cache behind.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let last_updated = snapshot
        .last_updated()
        .ok_or_else(|| AppError::CacheError("snapshot has never been loaded".to_string()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::CacheError(format!("Failed to create cache directory: {}", e))
        })?;
    }

    let cache = CacheFile {
        format_version: CACHE_VERSION,
        last_updated,
        source_version: snapshot.source_version().unwrap_or_default().to_string(),
        methods: entries_to_value(snapshot.entries()),
    };

    let tmp_path = path.with_extension("tmp");
    let file = File::create(&tmp_path)
        .map_err(|e| AppError::CacheError(format!("Failed to create cache file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &cache)
        .map_err(|e| AppError::CacheError(format!("Failed to write cache: {}", e)))?;
    writer
        .flush()
        .map_err(|e| AppError::CacheError(format!("Failed to flush cache file: {}", e)))?;
    drop(writer);

    fs::rename(&tmp_path, path)
        .map_err(|e| AppError::CacheError(format!("Failed to move cache into place: {}", e)))?;

    tracing::info!(
        path = %path.display(),
        methods = snapshot.len(),
        "Knowledge base cache saved"
    );

    Ok(())
}

/// Read the cache file.
///
/// Returns None if the file doesn't exist, has another format version, or its
/// contents don't match the recorded digest.
pub fn load_cache(path: &Path) -> Result<Option<CachedKnowledgeBase>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Cache file does not exist");
        return Ok(None);
    }

    let file = File::open(path)
        .map_err(|e| AppError::CacheError(format!("Failed to open cache file: {}", e)))?;

    let cache: CacheFile = match serde_json::from_reader(BufReader::new(file)) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable cache, ignoring");
            return Ok(None);
        }
    };

    if cache.format_version != CACHE_VERSION {
        tracing::warn!(
            path = %path.display(),
            cache_version = cache.format_version,
            expected_version = CACHE_VERSION,
            "Cache version mismatch, ignoring"
        );
        return Ok(None);
    }

    let entries = match entries_from_value(cache.methods) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache contents invalid, ignoring");
            return Ok(None);
        }
    };

    if compute_source_version(&entries) != cache.source_version {
        tracing::warn!(path = %path.display(), "Cache digest mismatch, ignoring");
        return Ok(None);
    }

    tracing::info!(
        path = %path.display(),
        methods = entries.len(),
        last_updated = %cache.last_updated,
        "Knowledge base cache loaded"
    );

    Ok(Some(CachedKnowledgeBase {
        entries,
        last_updated: cache.last_updated,
        source_version: cache.source_version,
    }))
}
