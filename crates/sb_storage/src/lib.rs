use std::sync::Arc;

use async_trait::async_trait;
use sb_core::{Error, ReportStorage, Result, UsageSink};
use tracing::info;

pub mod backends;
pub mod sources;

pub use backends::*;
pub use sources::JsonFileArticleSource;

/// A store that keeps both reports and token usage records.
#[async_trait]
pub trait StorageBackend: ReportStorage + UsageSink {
    async fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Report and usage handles for one backend, shared by the pipeline.
#[derive(Clone)]
pub struct StorageHandles {
    pub reports: Arc<dyn ReportStorage>,
    pub usage: Arc<dyn UsageSink>,
}

impl StorageHandles {
    pub fn from_backend<T: StorageBackend + 'static>(backend: T) -> Self {
        let backend = Arc::new(backend);
        Self {
            reports: backend.clone(),
            usage: backend,
        }
    }
}

/// Reports are looked up by company case-insensitively.
pub(crate) fn company_key(company_name: &str) -> String {
    company_name.trim().to_lowercase()
}

/// Opens the named backend. `location` is the database path for SQLite.
pub async fn create_storage(kind: &str, location: Option<&str>) -> Result<StorageHandles> {
    let handles = match kind {
        "memory" => StorageHandles::from_backend(MemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match location {
                Some(path) => SQLiteStorage::new_with_path(std::path::Path::new(path)).await?,
                None => <SQLiteStorage as StorageBackend>::new().await?,
            };
            StorageHandles::from_backend(storage)
        }
        other => return Err(Error::Storage(format!("Unsupported storage backend: {}", other))),
    };
    info!("Using {} storage{}", kind, location.map(|l| format!(" at {}", l)).unwrap_or_default());
    Ok(handles)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, JsonFileArticleSource, StorageBackend, StorageHandles};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        assert!(create_storage("memory", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        match create_storage("qdrant", None).await {
            Err(Error::Storage(msg)) => assert!(msg.contains("qdrant")),
            _ => panic!("expected storage error"),
        }
    }

    #[test]
    fn test_company_key() {
        assert_eq!(company_key("  ACME Corp "), "acme corp");
    }
}
