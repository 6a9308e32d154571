use crate::error::{AppError, Result};
use crate::knowledge::MethodEntries;
use crate::source::DocumentSource;
use async_trait::async_trait;
use std::sync::Arc;

/// Tries each source in order and returns the first success.
///
/// When every source fails, the last error is returned.
pub struct FallbackSource {
    sources: Vec<Arc<dyn DocumentSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Arc<dyn DocumentSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl DocumentSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self) -> Result<MethodEntries> {
        let mut last_error = AppError::FetchError("no document sources configured".to_string());

        for source in &self.sources {
            match source.fetch().await {
                Ok(entries) => {
                    tracing::info!(source = source.name(), methods = entries.len(), "Source fetch succeeded");
                    return Ok(entries);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "Source fetch failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MethodRecord;

    struct Fixed(std::result::Result<usize, &'static str>);

    #[async_trait]
    impl DocumentSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> Result<MethodEntries> {
            match self.0 {
                Ok(n) => Ok((0..n)
                    .map(|i| {
                        (
                            format!("m{}", i),
                            MethodRecord {
                                name: format!("M{}", i),
                                endpoint: format!("/m/{}", i),
                                http_method: "GET".to_string(),
                                description: String::new(),
                                parameters: Vec::new(),
                                example: String::new(),
                                response: String::new(),
                            },
                        )
                    })
                    .collect()),
                Err(msg) => Err(AppError::FetchError(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let source = FallbackSource::new(vec![
            Arc::new(Fixed(Err("browser unavailable"))),
            Arc::new(Fixed(Ok(2))),
            Arc::new(Fixed(Ok(5))),
        ]);

        assert_eq!(source.fetch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let source = FallbackSource::new(vec![
            Arc::new(Fixed(Err("first"))),
            Arc::new(Fixed(Err("second"))),
        ]);

        match source.fetch().await {
            Err(AppError::FetchError(msg)) => assert_eq!(msg, "second"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let source = FallbackSource::new(Vec::new());
        assert!(source.fetch().await.is_err());
    }
}
