use crate::error::{AppError, Result};
use crate::knowledge::{parse_method_map, MethodEntries};
use crate::source::DocumentSource;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads the mapping from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    label: String,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let label = format!("file:{}", path.display());
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<MethodEntries> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::FetchError(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let entries = parse_method_map(&content)?;
        tracing::debug!(
            path = %self.path.display(),
            methods = entries.len(),
            "Read methods from file"
        );
        Ok(entries)
    }
}
