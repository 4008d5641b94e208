//! Persistence boundary for extracted snapshots.

use crate::error::MetaResult;
use crate::models::SchemaInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stores the latest snapshot per data source.
///
/// `save_schemas` replaces the previous snapshot as a whole; snapshots are never merged.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_schemas(&self, data_source_id: &str, schemas: Vec<SchemaInfo>)
    -> MetaResult<()>;

    /// Latest snapshot, empty if the data source was never synced.
    async fn load_schemas(&self, data_source_id: &str) -> MetaResult<Vec<SchemaInfo>>;

    async fn last_sync(&self, data_source_id: &str) -> MetaResult<Option<DateTime<Utc>>>;

    async fn touch_last_sync(&self, data_source_id: &str, at: DateTime<Utc>) -> MetaResult<()>;
}

#[derive(Debug, Default)]
struct StoredSource {
    schemas: Vec<SchemaInfo>,
    last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    sources: Arc<RwLock<HashMap<String, StoredSource>>>,
}

impl InMemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn save_schemas(
        &self,
        data_source_id: &str,
        schemas: Vec<SchemaInfo>,
    ) -> MetaResult<()> {
        let mut sources = self.sources.write().await;
        sources
            .entry(data_source_id.to_string())
            .or_default()
            .schemas = schemas;
        Ok(())
    }

    async fn load_schemas(&self, data_source_id: &str) -> MetaResult<Vec<SchemaInfo>> {
        let sources = self.sources.read().await;
        Ok(sources
            .get(data_source_id)
            .map(|s| s.schemas.clone())
            .unwrap_or_default())
    }

    async fn last_sync(&self, data_source_id: &str) -> MetaResult<Option<DateTime<Utc>>> {
        let sources = self.sources.read().await;
        Ok(sources.get(data_source_id).and_then(|s| s.last_sync))
    }

    async fn touch_last_sync(&self, data_source_id: &str, at: DateTime<Utc>) -> MetaResult<()> {
        let mut sources = self.sources.write().await;
        sources
            .entry(data_source_id.to_string())
            .or_default()
            .last_sync = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TableInfo, TableType};

    #[tokio::test]
    async fn test_save_replaces_snapshot() {
        let store = InMemoryMetadataStore::new();
        let first = SchemaInfo::new("main", "ds")
            .with_table(TableInfo::new("a", TableType::Table))
            .with_table(TableInfo::new("b", TableType::Table));
        store.save_schemas("ds", vec![first]).await.unwrap();

        let second = SchemaInfo::new("main", "ds").with_table(TableInfo::new("c", TableType::Table));
        store.save_schemas("ds", vec![second]).await.unwrap();

        let loaded = store.load_schemas("ds").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].tables.len(), 1);
        assert_eq!(loaded[0].tables[0].name, "c");
    }

    #[tokio::test]
    async fn test_last_sync_per_source() {
        let store = InMemoryMetadataStore::new();
        assert!(store.last_sync("ds").await.unwrap().is_none());
        let now = Utc::now();
        store.touch_last_sync("ds", now).await.unwrap();
        assert_eq!(store.last_sync("ds").await.unwrap(), Some(now));
        assert!(store.last_sync("other").await.unwrap().is_none());
        assert!(store.load_schemas("other").await.unwrap().is_empty());
    }
}
