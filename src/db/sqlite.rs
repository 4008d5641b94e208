//! SQLite metadata adapter.
//!
//! Catalog reads use the `pragma_*` table-valued functions so table and index
//! names are bound as parameters rather than spliced into pragma text.

use crate::db::adapter::{
    ForeignKeyRow, MetadataAdapter, TableSize, group_foreign_keys, qualified_ident,
};
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::error::{MetaError, MetaResult};
use crate::models::{ColumnInfo, EngineType, ForeignKeyInfo, IndexInfo, TableInfo, TableType};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

pub struct SqliteAdapter;

fn schema_or_main(schema: &str) -> &str {
    if schema.is_empty() { "main" } else { schema }
}

async fn primary_key_columns(
    pool: &SqlitePool,
    schema: &str,
    table: &str,
) -> MetaResult<Vec<String>> {
    let rows = sqlx::query(queries::sqlite::PRIMARY_KEY_COLUMNS)
        .bind(table)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn index_columns(pool: &SqlitePool, schema: &str, index: &str) -> MetaResult<Vec<String>> {
    let rows = sqlx::query(queries::sqlite::INDEX_COLUMNS)
        .bind(index)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    // Expression index members have no name
    Ok(rows
        .iter()
        .filter_map(|row| row.try_get::<Option<String>, _>("name").ok().flatten())
        .collect())
}

#[async_trait]
impl MetadataAdapter for SqliteAdapter {
    fn engine(&self) -> EngineType {
        EngineType::Sqlite
    }

    async fn get_schemas(&self, pool: &DbPool) -> MetaResult<Vec<String>> {
        let pool = pool.as_sqlite()?;
        let rows = sqlx::query(queries::sqlite::LIST_SCHEMAS)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn get_tables(&self, pool: &DbPool, schema: &str) -> MetaResult<Vec<TableInfo>> {
        let pool = pool.as_sqlite()?;
        let schema = schema_or_main(schema);
        if schema != "main" {
            return Err(MetaError::schema(
                "Only the main SQLite database is extracted",
                schema,
            ));
        }

        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        let tables = rows
            .iter()
            .map(|row| {
                let name: String = row.get("name");
                let type_str: String = row.get("type");
                TableInfo::new(name, TableType::parse(&type_str)).with_schema(schema)
            })
            .collect::<Vec<_>>();

        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    async fn get_columns(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ColumnInfo>> {
        let pool = pool.as_sqlite()?;
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(table)
            .bind(schema_or_main(schema))
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let cid: i64 = row.get("cid");
                let name: String = row.get("name");
                let data_type: String = row.get("type");
                let notnull: i64 = row.get("notnull");
                let default_value: Option<String> = row.try_get("dflt_value").ok().flatten();
                let pk: i64 = row.get("pk");

                let mut col = ColumnInfo::new(&name, &data_type, notnull == 0)
                    .with_position((cid + 1).max(1) as u32)
                    .with_primary_key(pk > 0);

                if let Some(ref def) = default_value {
                    col = col.with_default_str(def);
                }
                col
            })
            .collect())
    }

    async fn get_indexes(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<IndexInfo>> {
        let pool = pool.as_sqlite()?;
        let schema = schema_or_main(schema);
        let idx_list = sqlx::query(queries::sqlite::LIST_INDEXES)
            .bind(table)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        let mut indexes = Vec::with_capacity(idx_list.len());
        for idx_row in &idx_list {
            let name: String = idx_row.get("name");
            let is_unique: i64 = idx_row.get("unique");
            let origin: String = idx_row.try_get("origin").unwrap_or_default();

            let columns = index_columns(pool, schema, &name).await?;
            if !columns.is_empty() {
                indexes.push(
                    IndexInfo::new(name, columns)
                        .with_unique(is_unique != 0)
                        .with_primary(origin == "pk"),
                );
            }
        }
        Ok(indexes)
    }

    async fn get_foreign_keys(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ForeignKeyInfo>> {
        let pool = pool.as_sqlite()?;
        let schema = schema_or_main(schema);
        let rows = sqlx::query(queries::sqlite::DESCRIBE_FOREIGN_KEYS)
            .bind(table)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        // A NULL "to" references the target's primary key implicitly
        let mut target_pks: HashMap<String, Vec<String>> = HashMap::new();
        let mut fk_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.get("id");
            let seq: i64 = row.get("seq");
            let target_table: String = row.get("table");
            let source_column: String = row.get("from");
            let target_column = match row.try_get::<Option<String>, _>("to").ok().flatten() {
                Some(col) => col,
                None => {
                    if !target_pks.contains_key(&target_table) {
                        let pks = primary_key_columns(pool, schema, &target_table).await?;
                        target_pks.insert(target_table.clone(), pks);
                    }
                    target_pks
                        .get(&target_table)
                        .and_then(|pks| pks.get(seq.max(0) as usize))
                        .cloned()
                        .unwrap_or_default()
                }
            };

            fk_rows.push(ForeignKeyRow {
                constraint: format!("fk_{}_{}", table, id),
                target_table,
                source_column,
                target_column,
                position: (seq + 1).max(1) as u32,
            });
        }

        Ok(group_foreign_keys(table, fk_rows))
    }

    async fn get_table_sizes(
        &self,
        pool: &DbPool,
        schema: &str,
    ) -> MetaResult<HashMap<String, TableSize>> {
        let pool = pool.as_sqlite()?;
        let schema = schema_or_main(schema);
        if schema != "main" {
            return Err(MetaError::schema(
                "Table sizes are only available for the main database",
                schema,
            ));
        }

        let rows = sqlx::query(queries::sqlite::TABLE_SIZES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get("table_name");
                let data_size: i64 = row.try_get("data_size").unwrap_or(-1);
                let index_size: i64 = row.try_get("index_size").unwrap_or(-1);
                (name, TableSize::new(data_size, index_size))
            })
            .collect())
    }

    async fn get_row_count(&self, pool: &DbPool, schema: &str, table: &str) -> MetaResult<i64> {
        let pool = pool.as_sqlite()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            qualified_ident(schema_or_main(schema), table, '"')
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataSourceConfig;
    use sqlx::sqlite::SqliteConnectOptions;

    async fn fixture() -> (tempfile::TempDir, DataSourceConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await.unwrap();
        for stmt in [
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE)",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL REFERENCES customers, total REAL DEFAULT 0)",
            "CREATE TABLE order_lines (order_id INTEGER, line_no INTEGER, sku TEXT, PRIMARY KEY (order_id, line_no))",
            "CREATE TABLE shipments (id INTEGER PRIMARY KEY, order_id INTEGER, line_no INTEGER, FOREIGN KEY (order_id, line_no) REFERENCES order_lines (order_id, line_no))",
            "CREATE INDEX idx_orders_customer ON orders (customer_id)",
            "INSERT INTO customers (id, email) VALUES (1, 'a@x'), (2, 'b@x')",
        ] {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;

        let config = DataSourceConfig::new("shop", "sqlite").with_database(path.to_string_lossy());
        (dir, config)
    }

    #[tokio::test]
    async fn test_extracts_columns_and_keys() {
        let (_dir, config) = fixture().await;
        let adapter = SqliteAdapter;
        let pool = adapter.connect(&config).await.unwrap();

        assert_eq!(adapter.get_schemas(&pool).await.unwrap(), vec!["main"]);

        let tables = adapter.get_tables(&pool, "main").await.unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "order_lines", "orders", "shipments"]);

        let columns = adapter.get_columns(&pool, "main", "orders").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].ordinal_position, 1);
        assert!(columns[0].is_primary_key);
        assert!(!columns[1].nullable);
        assert_eq!(columns[2].default_value, Some(serde_json::json!(0.0)));

        let fks = adapter
            .get_foreign_keys(&pool, "main", "orders")
            .await
            .unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].target_table, "customers");
        assert_eq!(fks[0].source_columns(), vec!["customer_id"]);
        assert_eq!(fks[0].target_columns(), vec!["id"]);

        let composite = adapter
            .get_foreign_keys(&pool, "main", "shipments")
            .await
            .unwrap();
        assert_eq!(composite.len(), 1);
        assert_eq!(composite[0].source_columns(), vec!["order_id", "line_no"]);
        assert_eq!(composite[0].target_columns(), vec!["order_id", "line_no"]);

        let indexes = adapter.get_indexes(&pool, "main", "orders").await.unwrap();
        assert!(indexes.iter().any(|i| i.name == "idx_orders_customer"));

        assert_eq!(
            adapter.get_row_count(&pool, "main", "customers").await.unwrap(),
            2
        );
        adapter.disconnect(pool).await;
    }

    #[tokio::test]
    async fn test_missing_table_row_count_fails() {
        let (_dir, config) = fixture().await;
        let adapter = SqliteAdapter;
        let pool = adapter.connect(&config).await.unwrap();
        assert!(
            adapter
                .get_row_count(&pool, "main", "no_such_table")
                .await
                .is_err()
        );
        adapter.disconnect(pool).await;
    }

    #[tokio::test]
    async fn test_connect_rejects_foreign_engine() {
        let config = DataSourceConfig::new("pg", "postgresql").with_host("localhost", None);
        assert!(matches!(
            SqliteAdapter.connect(&config).await,
            Err(MetaError::Validation { .. })
        ));
    }
}
