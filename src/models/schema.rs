//! Schema snapshot models.
//!
//! A sync produces a fresh `SchemaInfo` per remote schema. Snapshots are
//! replaced wholesale on the next sync, never patched in place.

use crate::error::{MetaError, MetaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for a size or row count whose extraction failed.
pub const UNKNOWN_SIZE: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub data_source_id: String,
    pub tables: Vec<TableInfo>,
    pub extracted_at: DateTime<Utc>,
}

impl SchemaInfo {
    /// Create an empty schema snapshot.
    pub fn new(name: impl Into<String>, data_source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_source_id: data_source_id.into(),
            tables: Vec::new(),
            extracted_at: Utc::now(),
        }
    }

    /// Add a table.
    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.tables.push(table);
        self
    }

    /// Look up a table by name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Total number of columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table_type: TableType,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    /// `-1` when the count query failed
    pub row_count: i64,
    /// Bytes (excluding indexes), `-1` when unknown
    pub data_size: i64,
    /// Bytes, `-1` when unknown
    pub index_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TableInfo {
    /// Create a new table info with unknown sizes.
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            schema: None,
            table_type,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            row_count: UNKNOWN_SIZE,
            data_size: UNKNOWN_SIZE,
            index_size: UNKNOWN_SIZE,
            comment: None,
            updated_at: None,
        }
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a foreign key.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyInfo) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Set the row count.
    pub fn with_row_count(mut self, row_count: i64) -> Self {
        self.row_count = row_count;
        self
    }

    /// Set the data and index sizes in bytes.
    pub fn with_sizes(mut self, data_size: i64, index_size: i64) -> Self {
        self.data_size = data_size;
        self.index_size = index_size;
        self
    }

    /// Set the table comment/description.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the last update timestamp.
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Look up a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Names of the primary key columns, in ordinal order.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Whether both size figures were extracted.
    pub fn has_known_size(&self) -> bool {
        self.data_size != UNKNOWN_SIZE && self.index_size != UNKNOWN_SIZE
    }

    /// Get the fully qualified table name.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Type of database table object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
    MaterializedView,
    SystemTable,
    TemporaryTable,
}

impl TableType {
    /// Parse table type from database-specific string.
    pub fn parse(s: &str) -> Self {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "table" | "base table" => Self::Table,
            "view" => Self::View,
            "materialized view" | "matview" => Self::MaterializedView,
            "system table" | "system view" => Self::SystemTable,
            "local temporary" | "temporary" | "temp" => Self::TemporaryTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
            Self::MaterializedView => write!(f, "materialized_view"),
            Self::SystemTable => write!(f, "system_table"),
            Self::TemporaryTable => write!(f, "temporary_table"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 1-based
    pub ordinal_position: u32,
    /// Full type (e.g., `varchar(30)`, `bigint unsigned`)
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// Default value with appropriate JSON type based on column data type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnInfo {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ordinal_position: 0,
            data_type: data_type.into(),
            nullable,
            is_primary_key: false,
            default_value: None,
            comment: None,
        }
    }

    /// Set the ordinal position.
    pub fn with_position(mut self, position: u32) -> Self {
        self.ordinal_position = position;
        self
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    /// Set the default value from a string, converting to appropriate JSON type
    /// based on the column's data_type.
    pub fn with_default_str(mut self, default_str: &str) -> Self {
        self.default_value = Some(parse_default_value(default_str, &self.data_type));
        self
    }

    /// Set the column comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

impl IndexInfo {
    /// Create a new index info.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_unique: false,
            is_primary: false,
        }
    }

    /// Set whether this is a unique index.
    pub fn with_unique(mut self, is_unique: bool) -> Self {
        self.is_unique = is_unique;
        self
    }

    /// Set whether this is the primary key index.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        if is_primary {
            self.is_unique = true;
        }
        self
    }
}

/// One column pair of a (possibly composite) foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyColumnInfo {
    pub source_column: String,
    pub target_column: String,
    /// 1-based position within the key
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source_table: String,
    pub target_table: String,
    pub columns: Vec<ForeignKeyColumnInfo>,
}

impl ForeignKeyInfo {
    /// Create a new foreign key without columns.
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            name: None,
            source_table: source_table.into(),
            target_table: target_table.into(),
            columns: Vec::new(),
        }
    }

    /// Create a single-column foreign key.
    pub fn single(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self::new(source_table, target_table).with_column_pair(source_column, target_column)
    }

    /// Set the constraint name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a column pair; position follows insertion order.
    pub fn with_column_pair(
        mut self,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        let position = self.columns.len() as u32 + 1;
        self.columns.push(ForeignKeyColumnInfo {
            source_column: source_column.into(),
            target_column: target_column.into(),
            position,
        });
        self
    }

    /// Source-side column names in key order.
    pub fn source_columns(&self) -> Vec<String> {
        let mut cols = self.columns.clone();
        cols.sort_by_key(|c| c.position);
        cols.into_iter().map(|c| c.source_column).collect()
    }

    /// Target-side column names in key order.
    pub fn target_columns(&self) -> Vec<String> {
        let mut cols = self.columns.clone();
        cols.sort_by_key(|c| c.position);
        cols.into_iter().map(|c| c.target_column).collect()
    }

    /// Check the key has at least one column pair and no blank names.
    pub fn validate(&self) -> MetaResult<()> {
        if self.columns.is_empty() {
            return Err(MetaError::validation(format!(
                "Foreign key {} -> {} has no columns",
                self.source_table, self.target_table
            )));
        }
        if self
            .columns
            .iter()
            .any(|c| c.source_column.is_empty() || c.target_column.is_empty())
        {
            return Err(MetaError::validation(format!(
                "Foreign key {} -> {} has an empty column name",
                self.source_table, self.target_table
            )));
        }
        Ok(())
    }
}

/// Parse a default value string into the appropriate JSON type based on column data type.
///
/// - Integer types (int, bigint, smallint, tinyint) → JSON Number
/// - Float types (float, double, real) → JSON Number
/// - Boolean types → JSON Boolean
/// - Decimal/numeric, strings and expressions → JSON String
pub fn parse_default_value(default_str: &str, data_type: &str) -> serde_json::Value {
    let dt_lower = data_type.to_lowercase();

    if dt_lower.contains("int") || dt_lower.contains("serial") {
        if let Ok(n) = default_str.parse::<i64>() {
            return serde_json::Value::Number(n.into());
        }
    }

    if (dt_lower.contains("float") || dt_lower.contains("double") || dt_lower == "real")
        && !dt_lower.contains("decimal")
        && !dt_lower.contains("numeric")
    {
        if let Ok(n) = default_str.parse::<f64>() {
            if let Some(num) = serde_json::Number::from_f64(n) {
                return serde_json::Value::Number(num);
            }
        }
    }

    if dt_lower.contains("bool") {
        match default_str.to_lowercase().as_str() {
            "true" | "1" | "t" => return serde_json::Value::Bool(true),
            "false" | "0" | "f" => return serde_json::Value::Bool(false),
            _ => {}
        }
    }

    serde_json::Value::String(default_str.to_string())
}
