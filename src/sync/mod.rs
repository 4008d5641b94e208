//! Metadata sync job orchestration.
//!
//! - `SyncJobRegistry`: job records and their state machine
//! - `SyncRunner`: drives an adapter under the job's timeout budget
//! - `MetadataStore`: where completed snapshots are persisted

pub mod registry;
pub mod runner;
pub mod store;

pub use registry::SyncJobRegistry;
pub use runner::{SyncRunner, SyncSettings};
pub use store::{InMemoryMetadataStore, MetadataStore};
