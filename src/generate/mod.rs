//! NL-derived entities to parameterized SQL.
//!
//! Pipeline: resolve tables and columns, build the WHERE clause, synthesize
//! joins from relationship edges, then assemble clauses in order.

pub mod condition;
pub mod generator;
pub mod join;
pub mod operators;
pub mod resolve;

pub use generator::SqlGenerator;
