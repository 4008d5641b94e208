//! schemalink library
//!
//! Pulls structural metadata from PostgreSQL, MySQL and SQLite data sources,
//! maintains a confidence-scored graph of table relationships, and turns
//! NL-derived entities into parameterized SQL with synthesized joins.

pub mod config;
pub mod db;
pub mod error;
pub mod generate;
pub mod models;
pub mod relationship;
pub mod sync;

pub use config::Config;
pub use error::{MetaError, MetaResult};
pub use generate::SqlGenerator;
pub use relationship::RelationshipEngine;
pub use sync::{SyncJobRegistry, SyncRunner};
