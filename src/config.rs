use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Hours between scheduled refreshes when `UPDATE_INTERVAL_HOURS` is unset.
pub const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 24;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// JSON mapping of method key to method record, produced by an external scraper
    /// or maintained by hand.
    pub docs_file: PathBuf,
    /// Optional URL serving the same JSON mapping. Tried before `docs_file`.
    pub docs_url: Option<String>,
    /// Warm-start cache written after every successful refresh.
    pub cache_path: PathBuf,
    /// Interval between scheduled refreshes.
    pub update_interval: Duration,
    /// Upper bound on a single document source fetch.
    pub fetch_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let update_interval = update_interval_from_hours(
            env::var("UPDATE_INTERVAL_HOURS")
                .unwrap_or_else(|_| DEFAULT_UPDATE_INTERVAL_HOURS.to_string())
                .parse()?,
        )?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            docs_file: PathBuf::from(
                env::var("DOCS_FILE").unwrap_or_else(|_| "./data/api_methods.json".to_string()),
            ),
            docs_url: env::var("DOCS_URL").ok().filter(|s| !s.trim().is_empty()),
            cache_path: PathBuf::from(
                env::var("CACHE_PATH")
                    .unwrap_or_else(|_| ".api-docs-kb/knowledge_base.json".to_string()),
            ),
            update_interval,
            fetch_timeout: Duration::from_secs(
                env::var("FETCH_TIMEOUT")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
            ),
        })
    }

    /// Configuration for tests and embedding: reads only the given docs file,
    /// no URL, default intervals.
    pub fn with_docs_file(docs_file: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            shutdown_timeout_secs: 0,
            docs_file: docs_file.into(),
            docs_url: None,
            cache_path: cache_path.into(),
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_HOURS * 3600),
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

/// Refresh interval for a number of hours. Zero and values that overflow are rejected.
fn update_interval_from_hours(hours: u64) -> anyhow::Result<Duration> {
    if hours == 0 {
        anyhow::bail!("UPDATE_INTERVAL_HOURS must be at least 1");
    }
    match hours.checked_mul(3600) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => anyhow::bail!("UPDATE_INTERVAL_HOURS is too large: {}", hours),
    }
}
