//! PostgreSQL metadata adapter.

use crate::db::adapter::{
    ForeignKeyRow, MetadataAdapter, TableSize, group_foreign_keys, qualified_ident,
};
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::error::MetaResult;
use crate::models::{ColumnInfo, EngineType, ForeignKeyInfo, IndexInfo, TableInfo, TableType};
use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

pub struct PostgresAdapter;

#[async_trait]
impl MetadataAdapter for PostgresAdapter {
    fn engine(&self) -> EngineType {
        EngineType::PostgreSql
    }

    async fn get_schemas(&self, pool: &DbPool) -> MetaResult<Vec<String>> {
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::LIST_SCHEMAS)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("schema_name")).collect())
    }

    async fn get_tables(&self, pool: &DbPool, schema: &str) -> MetaResult<Vec<TableInfo>> {
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        let tables = rows
            .iter()
            .filter_map(|row| {
                let name: String = row.get("table_name");
                if name.is_empty() {
                    return None;
                }
                let type_str: String = row.get("table_type");
                let mut table =
                    TableInfo::new(&name, TableType::parse(&type_str)).with_schema(schema);

                if let Ok(Some(comment)) = row.try_get::<Option<String>, _>("comment") {
                    if !comment.is_empty() {
                        table = table.with_comment(comment);
                    }
                }
                Some(table)
            })
            .collect::<Vec<_>>();

        debug!(count = tables.len(), schema = schema, "Listed PostgreSQL tables");
        Ok(tables)
    }

    async fn get_columns(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ColumnInfo>> {
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let position: i32 = row.try_get("ordinal_position").unwrap_or(0);
                let column_type: String = row.get("column_type");
                let nullable: String = row.get("is_nullable");
                let default_value: Option<String> = row.try_get("column_default").ok().flatten();
                let is_pk: bool = row.get("is_primary_key");
                let comment: Option<String> = row.try_get("column_comment").ok().flatten();

                let mut col = ColumnInfo::new(&name, &column_type, nullable == "YES")
                    .with_position(position.max(0) as u32)
                    .with_primary_key(is_pk);

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
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::DESCRIBE_INDEXES)
            .bind(table)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let name: String = row.get("index_name");
                let columns: Vec<String> = row.try_get("column_names").unwrap_or_default();
                let is_unique: bool = row.get("is_unique");
                let is_primary: bool = row.get("is_primary");

                if columns.is_empty() {
                    None
                } else {
                    Some(
                        IndexInfo::new(name, columns)
                            .with_unique(is_unique)
                            .with_primary(is_primary),
                    )
                }
            })
            .collect())
    }

    async fn get_foreign_keys(
        &self,
        pool: &DbPool,
        schema: &str,
        table: &str,
    ) -> MetaResult<Vec<ForeignKeyInfo>> {
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::DESCRIBE_FOREIGN_KEYS)
            .bind(table)
            .bind(schema)
            .fetch_all(pool)
            .await?;

        let fk_rows = rows
            .iter()
            .map(|row| ForeignKeyRow {
                constraint: row.get("constraint_name"),
                target_table: row.get("foreign_table_name"),
                source_column: row.get("column_name"),
                target_column: row.get("foreign_column_name"),
                position: row.try_get::<i32, _>("position").unwrap_or(0).max(0) as u32,
            })
            .collect();

        Ok(group_foreign_keys(table, fk_rows))
    }

    async fn get_table_sizes(
        &self,
        pool: &DbPool,
        schema: &str,
    ) -> MetaResult<HashMap<String, TableSize>> {
        let pool = pool.as_postgres()?;
        let rows = sqlx::query(queries::postgres::TABLE_SIZES)
            .bind(schema)
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
        let pool = pool.as_postgres()?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualified_ident(schema, table, '"'));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count)
    }
}
