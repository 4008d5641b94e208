//! Metadata adapter contract and factory.
//!
//! One capability interface with a strategy per engine. Adapters hold no
//! connection state: `connect` hands the caller a pool that is passed back in
//! on every call and released with `disconnect`.

use crate::db::mysql::MySqlAdapter;
use crate::db::pool::{DbPool, create_pool};
use crate::db::postgres::PostgresAdapter;
use crate::db::sqlite::SqliteAdapter;
use crate::error::{MetaError, MetaResult};
use crate::models::{
    ColumnInfo, DataSourceConfig, EngineType, ForeignKeyInfo, IndexInfo, TableInfo, UNKNOWN_SIZE,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Storage footprint of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSize {
    pub data_size: i64,
    pub index_size: i64,
}

impl TableSize {
    pub const UNKNOWN: TableSize = TableSize {
        data_size: UNKNOWN_SIZE,
        index_size: UNKNOWN_SIZE,
    };

    pub fn new(data_size: i64, index_size: i64) -> Self {
        Self {
            data_size,
            index_size,
        }
    }
}

#[async_trait]
pub trait MetadataAdapter: Send + Sync {
    /// Engine served by this adapter.
    fn engine(&self) -> EngineType;

    /// Open a scoped pool for the data source.
    async fn connect(&self, config: &DataSourceConfig) -> MetaResult<DbPool> {
        let engine = config.engine()?;
        if engine != self.engine() {
            return Err(MetaError::validation(format!(
                "Data source {} is {}, not {}",
                config.id,
                engine,
                self.engine()
            )));
        }
        create_pool(engine, config).await
    }

    /// Release a pool obtained from `connect`.
    async fn disconnect(&self, pool: DbPool) {
        pool.close().await;
    }

    /// Connect, round-trip once and disconnect.
    async fn test_connection(&self, config: &DataSourceConfig) -> MetaResult<()> {
        let pool = self.connect(config).await?;
        let result = pool.ping().await;
        self.disconnect(pool).await;
        result
    }

    /// User-visible schemas, system schemas excluded.
    async fn get_schemas(&self, pool: &DbPool) -> MetaResult<Vec<String>>;

    /// Tables and views of a schema, sizes and row counts left unknown.
    async fn get_tables(&self, pool: &DbPool, schema: &str) -> MetaResult<Vec<TableInfo>>;

    async fn get_columns(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ColumnInfo>>;

    async fn get_indexes(&self, pool: &DbPool, schema: &str, table: &str)
    -> MetaResult<Vec<IndexInfo>>;

    async fn get_foreign_keys(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ForeignKeyInfo>>;

    /// Sizes of every table in a schema from one catalog query.
    async fn get_table_sizes(
        &self,
        pool: &DbPool,
        schema: &str,
    ) -> MetaResult<HashMap<String, TableSize>>;

    /// Exact `COUNT(*)` of one table.
    async fn get_row_count(&self, pool: &DbPool, schema: &str, table: &str) -> MetaResult<i64>;
}

/// Resolves the adapter for a data source's engine type.
pub struct AdapterFactory;

impl AdapterFactory {
    /// Resolve by free-form engine name. Unknown engines fail with `UnsupportedType`.
    pub fn resolve(engine_type: &str) -> MetaResult<Arc<dyn MetadataAdapter>> {
        let engine = EngineType::parse(engine_type)
            .ok_or_else(|| MetaError::unsupported_type(engine_type))?;
        debug!(engine = %engine, "Resolved metadata adapter");
        Ok(Self::for_engine(engine))
    }

    /// Adapter for a known engine.
    pub fn for_engine(engine: EngineType) -> Arc<dyn MetadataAdapter> {
        match engine {
            EngineType::PostgreSql => Arc::new(PostgresAdapter),
            EngineType::MySql => Arc::new(MySqlAdapter),
            EngineType::Sqlite => Arc::new(SqliteAdapter),
        }
    }

    /// Canonical names of supported engines.
    pub fn supported() -> Vec<&'static str> {
        [EngineType::PostgreSql, EngineType::MySql, EngineType::Sqlite]
            .iter()
            .map(|e| e.as_str())
            .collect()
    }
}

/// One column pair of a foreign key as read from a catalog.
#[derive(Debug, Clone)]
pub(crate) struct ForeignKeyRow {
    pub constraint: String,
    pub target_table: String,
    pub source_column: String,
    pub target_column: String,
    pub position: u32,
}

/// Group catalog rows into composite keys, in order of first appearance.
pub(crate) fn group_foreign_keys(
    source_table: &str,
    rows: Vec<ForeignKeyRow>,
) -> Vec<ForeignKeyInfo> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<ForeignKeyRow>> = HashMap::new();
    for row in rows {
        if !grouped.contains_key(&row.constraint) {
            order.push(row.constraint.clone());
        }
        grouped.entry(row.constraint.clone()).or_default().push(row);
    }

    order
        .into_iter()
        .filter_map(|name| {
            let mut pairs = grouped.remove(&name)?;
            pairs.sort_by_key(|p| p.position);
            let target = pairs.first()?.target_table.clone();
            let fk = pairs.into_iter().fold(
                ForeignKeyInfo::new(source_table, target).with_name(name),
                |fk, p| fk.with_column_pair(p.source_column, p.target_column),
            );
            Some(fk)
        })
        .collect()
}

/// Quote an identifier, doubling embedded quote characters.
pub(crate) fn quote_ident(name: &str, quote: char) -> String {
    let escaped = name.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{escaped}{quote}")
}

/// `schema.table` quoted for the dialect; empty schema yields the bare table.
pub(crate) fn qualified_ident(schema: &str, table: &str, quote: char) -> String {
    if schema.is_empty() {
        quote_ident(table, quote)
    } else {
        format!("{}.{}", quote_ident(schema, quote), quote_ident(table, quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(constraint: &str, src: &str, tgt: &str, position: u32) -> ForeignKeyRow {
        ForeignKeyRow {
            constraint: constraint.to_string(),
            target_table: "order_lines".to_string(),
            source_column: src.to_string(),
            target_column: tgt.to_string(),
            position,
        }
    }

    #[test]
    fn test_factory_resolves_supported_engines() {
        assert_eq!(
            AdapterFactory::resolve("postgres").unwrap().engine(),
            EngineType::PostgreSql
        );
        assert_eq!(
            AdapterFactory::resolve("MariaDB").unwrap().engine(),
            EngineType::MySql
        );
        assert_eq!(
            AdapterFactory::resolve("sqlite").unwrap().engine(),
            EngineType::Sqlite
        );
        assert_eq!(
            AdapterFactory::supported(),
            vec!["postgresql", "mysql", "sqlite"]
        );
    }

    #[test]
    fn test_factory_rejects_unknown_engine() {
        for engine in ["oracle", "db2", "sqlserver", ""] {
            assert!(matches!(
                AdapterFactory::resolve(engine),
                Err(MetaError::UnsupportedType { .. })
            ));
        }
    }

    #[test]
    fn test_group_composite_foreign_keys() {
        let rows = vec![
            row("fk_line", "line_no", "line_no", 2),
            row("fk_line", "order_id", "order_id", 1),
            row("fk_other", "sku", "sku", 1),
        ];
        let fks = group_foreign_keys("shipments", rows);
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].name.as_deref(), Some("fk_line"));
        assert_eq!(fks[0].source_columns(), vec!["order_id", "line_no"]);
        assert_eq!(fks[0].source_table, "shipments");
        assert!(fks.iter().all(|fk| fk.validate().is_ok()));
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("orders", '"'), "\"orders\"");
        assert_eq!(quote_ident("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_ident("a`b", '`'), "`a``b`");
        assert_eq!(qualified_ident("public", "t", '"'), "\"public\".\"t\"");
        assert_eq!(qualified_ident("", "t", '`'), "`t`");
    }
}
