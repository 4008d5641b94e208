//! Metadata adapter layer.
//!
//! This module provides read-only metadata extraction:
//! - The `MetadataAdapter` contract and engine factory
//! - Scoped, engine-specific connection pools
//! - Catalog queries and per-engine strategies (PostgreSQL, MySQL, SQLite)

pub mod adapter;
pub mod mysql;
pub mod pool;
pub mod postgres;
mod queries;
pub mod sqlite;

pub use adapter::{AdapterFactory, MetadataAdapter, TableSize};
pub use mysql::MySqlAdapter;
pub use pool::{DbPool, create_pool};
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;
