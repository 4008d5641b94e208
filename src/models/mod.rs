//! Data models for schemalink.
//!
//! This module re-exports all model types used throughout the application.

pub mod datasource;
pub mod job;
pub mod query;
pub mod relationship;
pub mod schema;

// Re-export commonly used types
pub use datasource::{DataSourceConfig, EngineType};
pub use job::{DEFAULT_JOB_TIMEOUT_SECS, MetadataSyncJob, SyncStatus, SyncType};
pub use query::{
    EntityTag, EntityType, GenerationRequest, LimitRequirement, LimitType, QueryHistoryEntry,
    QueryIntent, QueryParam, QueryType, SortDirection, SortRequirement, SqlGenerationResult,
};
pub use relationship::{
    Junction, RelationSource, RelationType, RelationshipKey, TableRelationship,
};
pub use schema::{
    ColumnInfo, ForeignKeyColumnInfo, ForeignKeyInfo, IndexInfo, SchemaInfo, TableInfo,
    TableType, UNKNOWN_SIZE, parse_default_value,
};
