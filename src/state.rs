use crate::config::Config;
use crate::error::{AppError, Result};
use crate::knowledge::{KnowledgeStore, MethodRecord, QueryEngine, StoreStatus};
use crate::persistence;
use crate::refresh::{RefreshReport, RefreshScheduler, SchedulerSettings, SchedulerStatus};
use crate::source::{self, DocumentSource};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A method record together with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyedMethod {
    pub key: String,
    pub record: MethodRecord,
}

impl From<(String, MethodRecord)> for KeyedMethod {
    fn from((key, record): (String, MethodRecord)) -> Self {
        Self { key, record }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Updated,
    Unchanged,
    Failed,
    AlreadyRefreshing,
    Cancelled,
}

/// What `update_knowledge_base` reports. Failures are described, never raised.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub success: bool,
    pub outcome: RefreshOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RefreshReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method_count: usize,
}

/// Combined store and scheduler status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseStatus {
    #[serde(flatten)]
    pub store: StoreStatus,
    #[serde(flatten)]
    pub refresh: SchedulerStatus,
    pub source: String,
}

/// Application state shared across all request handlers and the MCP server.
///
/// Holds the one store instance; the query engine and the scheduler both get a
/// handle to it.
pub struct AppState {
    pub store: Arc<KnowledgeStore>,
    pub queries: QueryEngine,
    pub scheduler: Arc<RefreshScheduler>,
    source_name: String,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state with the document sources described by `config` and warm-start
    /// the store from the cache file if one exists.
    pub fn new(config: Config) -> Self {
        let source = source::from_config(&config);
        Self::with_source(config, source)
    }

    /// Build state around an explicit document source.
    pub fn with_source(config: Config, source: Arc<dyn DocumentSource>) -> Self {
        let store = Arc::new(KnowledgeStore::new());
        let source_name = source.name().to_string();
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&store),
            source,
            SchedulerSettings::from_config(&config),
        ));

        let state = Self {
            queries: QueryEngine::new(Arc::clone(&store)),
            store,
            scheduler,
            source_name,
            config: Arc::new(config),
        };

        state.warm_start();
        state
    }

    /// Load the cached knowledge base, if any, so queries work before the first
    /// refresh. An unreadable cache is logged and skipped.
    fn warm_start(&self) {
        let cached = match persistence::load_cache(&self.config.cache_path) {
            Ok(Some(cached)) => cached,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Cache unavailable, starting empty");
                return;
            }
        };

        match self.store.restore(cached.entries, cached.last_updated) {
            Ok(snapshot) => tracing::info!(
                methods = snapshot.len(),
                last_updated = %cached.last_updated,
                "Warm-started knowledge base from cache"
            ),
            Err(e) => tracing::warn!(error = %e, "Cached knowledge base rejected, starting empty"),
        }
    }

    /// Start the periodic refresh task. The first live refresh runs at once; a
    /// warm-started cache only serves until it completes.
    pub fn start_scheduler(&self) -> JoinHandle<()> {
        self.scheduler.spawn(true)
    }

    /// Ready once the store holds a snapshot.
    pub fn is_ready(&self) -> bool {
        self.store.snapshot().is_loaded()
    }

    pub fn search_api_methods(&self, query: &str) -> Vec<KeyedMethod> {
        let results: Vec<KeyedMethod> = self
            .queries
            .search(query)
            .into_iter()
            .map(KeyedMethod::from)
            .collect();

        tracing::debug!(query = %query, matches = results.len(), "Search completed");
        metrics::counter!("search_requests_total").increment(1);
        results
    }

    pub fn get_api_method_details(&self, key: &str) -> Result<MethodRecord> {
        metrics::counter!("detail_requests_total").increment(1);
        self.queries.get_details(key)
    }

    pub fn list_all_api_methods(&self) -> Vec<KeyedMethod> {
        self.queries
            .list_all()
            .into_iter()
            .map(KeyedMethod::from)
            .collect()
    }

    pub fn group_api_methods(&self) -> BTreeMap<String, Vec<String>> {
        self.queries.group_by_resource()
    }

    /// Refresh on demand. The outcome is reported in the summary; the store keeps
    /// serving its previous snapshot whenever the refresh does not succeed.
    pub async fn update_knowledge_base(&self) -> RefreshSummary {
        let result = self.scheduler.refresh().await;
        let method_count = self.store.snapshot().len();

        match result {
            Ok(report) => {
                let outcome = if report.changed {
                    RefreshOutcome::Updated
                } else {
                    RefreshOutcome::Unchanged
                };
                let message = match outcome {
                    RefreshOutcome::Updated => format!(
                        "Knowledge base updated with {} methods",
                        report.method_count
                    ),
                    _ => format!(
                        "Knowledge base refreshed, {} methods, content unchanged",
                        report.method_count
                    ),
                };

                RefreshSummary {
                    success: true,
                    outcome,
                    message,
                    report: Some(report),
                    error: None,
                    method_count,
                }
            }
            Err(e) => {
                let outcome = match e {
                    AppError::AlreadyRefreshing => RefreshOutcome::AlreadyRefreshing,
                    AppError::Cancelled => RefreshOutcome::Cancelled,
                    _ => RefreshOutcome::Failed,
                };

                RefreshSummary {
                    success: false,
                    outcome,
                    message: format!(
                        "Knowledge base not updated, still serving {} methods",
                        method_count
                    ),
                    report: None,
                    error: Some(e.to_string()),
                    method_count,
                }
            }
        }
    }

    pub fn get_knowledge_base_status(&self) -> KnowledgeBaseStatus {
        KnowledgeBaseStatus {
            store: self.store.status(),
            refresh: self.scheduler.status(),
            source: self.source_name.clone(),
        }
    }
}
