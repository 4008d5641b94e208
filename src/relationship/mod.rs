//! Relationship inference.
//!
//! Evidence sources, strongest first:
//! - declared foreign keys (`rules::from_foreign_keys`)
//! - user feedback (`RelationshipEngine::record_feedback`)
//! - naming conventions and column similarity (`rules`, `similarity`)
//! - joins mined from executed SQL (`history`)

pub mod engine;
pub mod history;
pub mod rules;
pub mod similarity;

pub use engine::RelationshipEngine;
pub use history::JoinObservation;
