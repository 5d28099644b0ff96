//! # QuarryDB
//!
//! An embedded, single-process document store. Records are JSON attribute
//! maps grouped into named tables, held in memory, with per-column secondary
//! indexes and an optional flat snapshot mirror on disk.
//!
//! A caller registers a schema set (table names, column types, which columns
//! are primary/unique/indexed) and then performs CRUD and query operations
//! in-process — no separate database server.
//!
//! ## Quick start
//!
//! ```
//! use quarry_core::{
//!     ColumnDef, ColumnType, Condition, QuarryDB, SchemaSet, TableSchema,
//! };
//! use serde_json::json;
//!
//! let schemas = SchemaSet::new().with(TableSchema::new(
//!     "users",
//!     vec![
//!         ColumnDef::new("id", ColumnType::Number).primary(),
//!         ColumnDef::new("email", ColumnType::Text).unique().indexed(),
//!         ColumnDef::new("role", ColumnType::Text).indexed(),
//!     ],
//! ));
//!
//! let db = QuarryDB::new(schemas);
//! db.save("users", json!({"email": "alice@example.com", "role": "admin"}))
//!     .unwrap();
//!
//! let admins = db
//!     .query("users")
//!     .filter(Condition::eq("role", "admin"))
//!     .execute()
//!     .unwrap();
//! assert_eq!(admins.len(), 1);
//! ```

pub mod api;
pub mod condition;
pub mod error;
pub mod index;
pub mod persistence;
pub mod query;
pub mod store;
pub mod types;

mod mutation;
mod projection;

pub use api::{FindBuilder, QuarryDB};
pub use condition::{BoolOp, Condition, Operator};
pub use error::{Error, IndexError, PersistError, Result, SchemaError, ValueError};
pub use persistence::{JsonFilePersistence, MemoryPersistence, Persistence, Snapshot};
pub use query::{
    Aggregate, Direction, GroupSpec, JoinKind, JoinOn, JoinSpec, OrderSpec, QueryOptions,
};
pub use types::{ColumnDef, ColumnType, FieldValue, RecordId, SchemaSet, TableSchema};
