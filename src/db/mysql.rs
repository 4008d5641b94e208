//! MySQL / MariaDB metadata adapter.
//!
//! MySQL may return VARBINARY instead of VARCHAR from `information_schema`
//! depending on charset configuration, so every string read goes through the
//! lenient helpers below.

use crate::db::adapter::{
    ForeignKeyRow, MetadataAdapter, TableSize, group_foreign_keys, qualified_ident,
};
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::error::MetaResult;
use crate::models::{ColumnInfo, EngineType, ForeignKeyInfo, IndexInfo, TableInfo, TableType};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use sqlx::mysql::MySqlRow;
use std::collections::HashMap;
use tracing::debug;

pub struct MySqlAdapter;

/// Try to get a u64 value from a row, handling MySQL version differences.
/// MySQL 5.x may return BIGINT (i64), MySQL 8.x returns BIGINT UNSIGNED (u64).
fn try_get_u64(row: &MySqlRow, column: &str) -> Option<u64> {
    if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(column) {
        return Some(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(column) {
        return Some(v.max(0) as u64);
    }
    if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(column) {
        return Some(v as u64);
    }
    None
}

/// Safely get a string from a MySQL row.
fn get_string(row: &MySqlRow, column: &str) -> String {
    row.try_get::<String, _>(column)
        .ok()
        .or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
        .unwrap_or_default()
}

/// Safely get an optional string from a MySQL row.
fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .or_else(|| {
            row.try_get::<Option<Vec<u8>>, _>(column)
                .ok()
                .flatten()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

/// Empty schema means "the connection's database".
fn schema_param(schema: &str) -> Option<&str> {
    Some(schema).filter(|s| !s.is_empty())
}

fn size_or_unknown(row: &MySqlRow, column: &str) -> i64 {
    try_get_u64(row, column)
        .and_then(|v| i64::try_from(v).ok())
        .unwrap_or(-1)
}

#[async_trait]
impl MetadataAdapter for MySqlAdapter {
    fn engine(&self) -> EngineType {
        EngineType::MySql
    }

    async fn get_schemas(&self, pool: &DbPool) -> MetaResult<Vec<String>> {
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::LIST_SCHEMAS)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| get_string(row, "SCHEMA_NAME"))
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn get_tables(&self, pool: &DbPool, schema: &str) -> MetaResult<Vec<TableInfo>> {
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .bind(schema_param(schema))
            .fetch_all(pool)
            .await?;

        let tables = rows
            .iter()
            .filter_map(|row| {
                let name = get_string(row, "TABLE_NAME");
                if name.is_empty() {
                    return None;
                }

                let type_str = get_string(row, "TABLE_TYPE");
                let mut table = TableInfo::new(&name, TableType::parse(&type_str));
                if !schema.is_empty() {
                    table = table.with_schema(schema);
                }

                if let Ok(Some(updated)) = row.try_get::<Option<NaiveDateTime>, _>("UPDATED_AT") {
                    table = table.with_updated_at(updated.and_utc());
                }
                if let Some(comment) = get_optional_string(row, "TABLE_COMMENT") {
                    if !comment.is_empty() {
                        table = table.with_comment(comment);
                    }
                }
                Some(table)
            })
            .collect::<Vec<_>>();

        debug!(count = tables.len(), schema = schema, "Listed MySQL tables");
        Ok(tables)
    }

    async fn get_columns(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ColumnInfo>> {
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table)
            .bind(schema_param(schema))
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "COLUMN_NAME");
                let position = try_get_u64(row, "ORDINAL_POSITION").unwrap_or(0) as u32;
                let column_type = get_string(row, "COLUMN_TYPE");
                let nullable = get_string(row, "IS_NULLABLE");
                let default_value = get_optional_string(row, "COLUMN_DEFAULT");
                let column_key = get_string(row, "COLUMN_KEY");
                let comment = get_optional_string(row, "COLUMN_COMMENT");

                let mut col = ColumnInfo::new(&name, &column_type, nullable == "YES")
                    .with_position(position)
                    .with_primary_key(column_key == "PRI");

                if let Some(ref def) = default_value {
                    col = col.with_default_str(def);
                }
                if let Some(ref c) = comment {
                    if !c.is_empty() {
                        col = col.with_comment(c);
                    }
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
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::DESCRIBE_INDEXES)
            .bind(table)
            .bind(schema_param(schema))
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = get_string(row, "INDEX_NAME");
                let columns: Vec<String> = get_string(row, "COLUMN_NAMES")
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if columns.is_empty() {
                    return None;
                }
                let is_unique: i64 = row.try_get("IS_UNIQUE").unwrap_or(0);
                let is_primary = name == "PRIMARY";

                Some(
                    IndexInfo::new(name, columns)
                        .with_unique(is_unique != 0)
                        .with_primary(is_primary),
                )
            })
            .collect())
    }

    async fn get_foreign_keys(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ForeignKeyInfo>> {
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::DESCRIBE_FOREIGN_KEYS)
            .bind(table)
            .bind(schema_param(schema))
            .fetch_all(pool)
            .await?;

        let fk_rows = rows
            .iter()
            .map(|row| ForeignKeyRow {
                constraint: get_string(row, "CONSTRAINT_NAME"),
                target_table: get_string(row, "REFERENCED_TABLE_NAME"),
                source_column: get_string(row, "COLUMN_NAME"),
                target_column: get_string(row, "REFERENCED_COLUMN_NAME"),
                position: try_get_u64(row, "ORDINAL_POSITION").unwrap_or(0) as u32,
            })
            .collect();

        Ok(group_foreign_keys(table, fk_rows))
    }

    async fn get_table_sizes(
        &self,
        pool: &DbPool,
        schema: &str,
    ) -> MetaResult<HashMap<String, TableSize>> {
        let pool = pool.as_mysql()?;
        let rows = sqlx::query(queries::mysql::TABLE_SIZES)
            .bind(schema_param(schema))
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "TABLE_NAME");
                let size = TableSize::new(
                    size_or_unknown(row, "DATA_SIZE"),
                    size_or_unknown(row, "INDEX_SIZE"),
                );
                (name, size)
            })
            .collect())
    }

    async fn get_row_count(&self, pool: &DbPool, schema: &str, table: &str) -> MetaResult<i64> {
        let pool = pool.as_mysql()?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualified_ident(schema, table, '`'));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_schema_means_connection_database() {
        assert_eq!(schema_param(""), None);
        assert_eq!(schema_param("shop"), Some("shop"));
    }
}
