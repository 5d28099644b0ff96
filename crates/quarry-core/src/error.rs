//! Error types for all QuarryDB operations.

use std::io;
use thiserror::Error;

/// Top-level error type for QuarryDB operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors resolving a table or its declared columns.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table not registered: {0}")]
    TableNotRegistered(String),

    #[error("no primary column declared for table '{0}'")]
    NoPrimaryColumn(String),
}

/// Errors raised by index lookups and uniqueness enforcement.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("unique constraint violated on column '{column}' for value {value}")]
    UniqueViolation { column: String, value: String },

    #[error("ordered lookup is not supported on hash-only index for column '{column}'")]
    UnsupportedOperation { column: String },
}

/// Errors raised by malformed records handed to the mutation engine.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no value for primary column '{column}'")]
    MissingId { column: String },

    #[error("primary column '{column}' value does not match its declared type")]
    IdTypeMismatch { column: String },
}

/// Errors at the persisted-snapshot boundary.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
