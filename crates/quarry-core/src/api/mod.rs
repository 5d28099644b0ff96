//! Public API: database handle and the fluent query builder.

pub mod builders;
pub mod database;

pub use builders::FindBuilder;
pub use database::QuarryDB;
