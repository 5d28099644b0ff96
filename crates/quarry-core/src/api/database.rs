//! The main database handle.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, SchemaError};
use crate::mutation;
use crate::persistence::{Persistence, Snapshot};
use crate::query::{self, QueryOptions};
use crate::store::TableStore;
use crate::types::{FieldValue, RecordId, SchemaSet, TableSchema};

use super::builders::FindBuilder;

struct Inner {
    schemas: SchemaSet,
    store: RwLock<TableStore>,
    persistence: Option<Box<dyn Persistence>>,
    auto_persist: bool,
}

/// An embedded document store over an explicit schema set.
///
/// `QuarryDB` is cheaply clonable (`Arc`-based) and `Send + Sync`. Mutations
/// take the write lock for their full duration, so per-call serialization is
/// built in; interleaving guarantees beyond a single call are the caller's
/// responsibility.
#[derive(Clone)]
pub struct QuarryDB {
    inner: Arc<Inner>,
}

impl QuarryDB {
    /// Create an in-memory instance with no persistence.
    pub fn new(schemas: SchemaSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                schemas,
                store: RwLock::new(TableStore::new()),
                persistence: None,
                auto_persist: false,
            }),
        }
    }

    /// Create an instance mirrored to a persisted snapshot.
    ///
    /// Loads the snapshot once and rebuilds every table's secondary indexes
    /// from the loaded records. When `auto_persist` is set, the whole dataset
    /// is flushed after every successful mutation.
    pub fn with_persistence(
        schemas: SchemaSet,
        persistence: impl Persistence + 'static,
        auto_persist: bool,
    ) -> Result<Self> {
        let snapshot = persistence.load()?;
        let mut store = TableStore::new();

        for (table, records) in snapshot {
            let Some(schema) = schemas.get(&table) else {
                warn!(table, "snapshot table has no registered schema, skipping");
                continue;
            };
            let data = store.table_mut(schema);
            for record in records.into_values() {
                match record_id(schema, &record) {
                    Some(id) => {
                        data.records.insert(id, record);
                    }
                    None => {
                        warn!(table, "snapshot record has no usable identifier, skipping")
                    }
                }
            }
            mutation::rebuild_indexes(schema, data);
            info!(table, records = data.len(), "table loaded from snapshot");
        }

        Ok(Self {
            inner: Arc::new(Inner {
                schemas,
                store: RwLock::new(store),
                persistence: Some(Box::new(persistence)),
                auto_persist,
            }),
        })
    }

    /// Insert or fully replace a record. Returns its identifier.
    pub fn save(&self, table: &str, record: Value) -> Result<RecordId> {
        let schema = self.schema(table)?;
        let mut store = self.inner.store.write();
        let id = mutation::save(schema, store.table_mut(schema), record)?;
        self.flush_if_auto(&store)?;
        Ok(id)
    }

    /// Delete a record. The caller supplies the current (pre-removal) record.
    pub fn remove(&self, table: &str, record: &Value) -> Result<RecordId> {
        let schema = self.schema(table)?;
        let mut store = self.inner.store.write();
        let id = mutation::remove(schema, store.table_mut(schema), record)?;
        self.flush_if_auto(&store)?;
        Ok(id)
    }

    /// Execute a query described by `options`.
    pub fn find(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>> {
        let store = self.inner.store.read();
        query::run(options, table, &self.inner.schemas, &store)
    }

    /// Point lookup by primary value.
    pub fn get(&self, table: &str, id: impl Into<Value>) -> Result<Option<Value>> {
        let schema = self.schema(table)?;
        let primary = schema
            .primary_column()
            .ok_or_else(|| SchemaError::NoPrimaryColumn(table.to_string()))?;
        let Some(key) = FieldValue::from_json(&id.into(), primary.column_type) else {
            return Ok(None);
        };
        let store = self.inner.store.read();
        Ok(store.table(table).and_then(|data| data.get(&key).cloned()))
    }

    /// Number of records currently held in a table.
    pub fn count(&self, table: &str) -> Result<usize> {
        self.schema(table)?;
        let store = self.inner.store.read();
        Ok(store.table(table).map(|data| data.len()).unwrap_or(0))
    }

    /// Registered table names.
    pub fn tables(&self) -> Vec<String> {
        self.inner.schemas.names().map(String::from).collect()
    }

    /// Start a fluent query against a table.
    pub fn query(&self, table: &str) -> FindBuilder<'_> {
        FindBuilder::new(self, table.to_string())
    }

    /// Flush the whole dataset to the persistence collaborator, if any.
    pub fn persist(&self) -> Result<()> {
        let store = self.inner.store.read();
        self.flush(&store)
    }

    fn schema(&self, table: &str) -> Result<&TableSchema> {
        self.inner
            .schemas
            .get(table)
            .ok_or_else(|| SchemaError::TableNotRegistered(table.to_string()).into())
    }

    fn flush_if_auto(&self, store: &TableStore) -> Result<()> {
        if self.inner.auto_persist {
            self.flush(store)?;
        }
        Ok(())
    }

    fn flush(&self, store: &TableStore) -> Result<()> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };
        let snapshot = build_snapshot(store);
        persistence.save(&snapshot)?;
        Ok(())
    }
}

fn record_id(schema: &TableSchema, record: &Value) -> Option<FieldValue> {
    let primary = schema.primary_column()?;
    FieldValue::from_json(record.get(&primary.name)?, primary.column_type)
        .filter(|v| *v != FieldValue::Null)
}

fn build_snapshot(store: &TableStore) -> Snapshot {
    store
        .iter()
        .map(|(name, data)| {
            let records = data
                .records
                .iter()
                .map(|(id, record)| (id.storage_key(), record.clone()))
                .collect();
            (name.to_string(), records)
        })
        .collect()
}
