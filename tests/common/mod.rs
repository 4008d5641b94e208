//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemalink::db::{DbPool, MetadataAdapter, SqliteAdapter, TableSize};
use schemalink::models::{ColumnInfo, DataSourceConfig, EngineType, ForeignKeyInfo, IndexInfo, TableInfo};
use schemalink::{MetaError, MetaResult};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SHOP_DDL: &[&str] = &[
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
    "CREATE TABLE products (id INTEGER PRIMARY KEY, title TEXT NOT NULL, price REAL)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL REFERENCES customers (id), status TEXT, total REAL)",
    "CREATE TABLE order_items (order_id INTEGER NOT NULL, product_id INTEGER NOT NULL, quantity INTEGER, PRIMARY KEY (order_id, product_id))",
    "CREATE INDEX idx_orders_status ON orders (status)",
    "CREATE VIEW paid_orders AS SELECT * FROM orders WHERE status = 'paid'",
    "INSERT INTO customers (id, name, email) VALUES (1, 'Ada', 'ada@example.com'), (2, 'Linus', NULL)",
    "INSERT INTO orders (id, customer_id, status, total) VALUES (10, 1, 'paid', 12.5), (11, 1, 'new', 3.0), (12, 2, 'paid', 7.25)",
];

/// A throwaway SQLite database file; dropped with the directory.
pub struct ShopDb {
    pub dir: tempfile::TempDir,
    pub config: DataSourceConfig,
}

impl ShopDb {
    pub async fn create(data_source_id: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await.unwrap();
        for stmt in SHOP_DDL {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;

        let config =
            DataSourceConfig::new(data_source_id, "sqlite").with_database(path.to_string_lossy());
        Self { dir, config }
    }

    /// Run statements against the database outside any sync job.
    pub async fn execute(&self, statements: &[&str]) {
        let path = self.dir.path().join("shop.db");
        let pool = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        for stmt in statements {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }
}

/// SQLite adapter with injectable latency, failures and modification times.
#[derive(Default)]
pub struct ScriptedAdapter {
    pub column_delay: Duration,
    /// Column and row count reads of this table fail
    pub unreadable_table: Option<String>,
    /// Reported as every table's modification time
    pub updated_at: Option<DateTime<Utc>>,
    pub column_calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn column_calls(&self) -> usize {
        self.column_calls.load(Ordering::SeqCst)
    }

    fn check_readable(&self, table: &str) -> MetaResult<()> {
        match &self.unreadable_table {
            Some(name) if name == table => Err(MetaError::schema("permission denied", table)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataAdapter for ScriptedAdapter {
    fn engine(&self) -> EngineType {
        EngineType::Sqlite
    }

    async fn get_schemas(&self, pool: &DbPool) -> MetaResult<Vec<String>> {
        SqliteAdapter.get_schemas(pool).await
    }

    async fn get_tables(&self, pool: &DbPool, schema: &str) -> MetaResult<Vec<TableInfo>> {
        let mut tables = SqliteAdapter.get_tables(pool, schema).await?;
        if let Some(at) = self.updated_at {
            for table in &mut tables {
                table.updated_at = Some(at);
            }
        }
        Ok(tables)
    }

    async fn get_columns(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ColumnInfo>> {
        self.column_calls.fetch_add(1, Ordering::SeqCst);
        if !self.column_delay.is_zero() {
            tokio::time::sleep(self.column_delay).await;
        }
        self.check_readable(table)?;
        SqliteAdapter.get_columns(pool, schema, table).await
    }

    async fn get_indexes(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<IndexInfo>> {
        SqliteAdapter.get_indexes(pool, schema, table).await
    }

    async fn get_foreign_keys(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ForeignKeyInfo>> {
        SqliteAdapter.get_foreign_keys(pool, schema, table).await
    }

    async fn get_table_sizes(
        &self,
        pool: &DbPool,
        schema: &str,
    ) -> MetaResult<HashMap<String, TableSize>> {
        SqliteAdapter.get_table_sizes(pool, schema).await
    }

    async fn get_row_count(&self, pool: &DbPool, schema: &str, table: &str) -> MetaResult<i64> {
        self.check_readable(table)?;
        SqliteAdapter.get_row_count(pool, schema, table).await
    }
}
