//! Document sources: producers of complete method mappings.
//!
//! The refresh scheduler depends only on [`DocumentSource`]. How a mapping is
//! obtained (scraped, downloaded, hand-maintained) is up to the implementation.

pub mod fallback;
pub mod file;
pub mod http;

pub use fallback::FallbackSource;
pub use file::FileSource;
pub use http::HttpSource;

use crate::config::Config;
use crate::error::Result;
use crate::knowledge::MethodEntries;
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can produce a complete mapping of method key to method record.
///
/// Implementations return `FetchError` when the data cannot be reached and
/// `ParseError` when it cannot be mapped to the schema.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label for logs and status output.
    fn name(&self) -> &str;

    /// Fetch the full mapping. May take arbitrarily long.
    async fn fetch(&self) -> Result<MethodEntries>;
}

/// Build the source chain from configuration: the URL source (if configured)
/// followed by the docs file.
pub fn from_config(config: &Config) -> Arc<dyn DocumentSource> {
    let file: Arc<dyn DocumentSource> = Arc::new(FileSource::new(&config.docs_file));

    match &config.docs_url {
        Some(url) => {
            let http: Arc<dyn DocumentSource> =
                Arc::new(HttpSource::new(url.clone(), config.fetch_timeout));
            Arc::new(FallbackSource::new(vec![http, file]))
        }
        None => file,
    }
}
