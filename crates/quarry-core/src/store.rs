//! In-memory table storage: the single owner of all record data.
//!
//! A `TableData` holds one table's records keyed by identifier together with
//! that table's secondary indexes and id counter. Indexes only ever hold
//! identifiers; query results hand out clones, never the live record.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use crate::index::{IndexMode, SecondaryIndex};
use crate::types::{RecordId, TableSchema};

/// One table's records plus its index set.
#[derive(Debug, Clone)]
pub struct TableData {
    pub(crate) records: BTreeMap<RecordId, Value>,
    pub(crate) indexes: HashMap<String, SecondaryIndex>,
    /// Next value handed out for generated numeric primary keys.
    pub(crate) next_id: u64,
}

impl TableData {
    /// Create empty table data with one index per indexed column.
    pub fn for_schema(schema: &TableSchema) -> Self {
        let indexes = schema
            .indexed_columns()
            .map(|col| {
                (
                    col.name.clone(),
                    SecondaryIndex::new(col.name.clone(), IndexMode::for_column(col.column_type)),
                )
            })
            .collect();
        Self {
            records: BTreeMap::new(),
            indexes,
            next_id: 1,
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&Value> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The full identifier set, used as the base of `not` negation.
    pub fn all_ids(&self) -> BTreeSet<RecordId> {
        self.records.keys().cloned().collect()
    }

    pub fn index(&self, column: &str) -> Option<&SecondaryIndex> {
        self.indexes.get(column)
    }
}

/// Mapping from table name to that table's data.
///
/// Tables come into existence on first write (or on snapshot load) and are
/// never explicitly destroyed.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, TableData>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.get(name)
    }

    /// Fetch or create the table's data, initializing indexes from the schema.
    pub fn table_mut(&mut self, schema: &TableSchema) -> &mut TableData {
        self.tables
            .entry(schema.name.clone())
            .or_insert_with(|| TableData::for_schema(schema))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableData)> {
        self.tables.iter().map(|(name, data)| (name.as_str(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ColumnType};
    use serde_json::json;

    fn users_schema() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Number).primary(),
                ColumnDef::new("email", ColumnType::Text).unique().indexed(),
                ColumnDef::new("name", ColumnType::Text),
            ],
        )
    }

    #[test]
    fn test_for_schema_builds_indexes() {
        let data = TableData::for_schema(&users_schema());
        assert!(data.index("id").is_some());
        assert!(data.index("email").is_some());
        assert!(data.index("name").is_none());
        assert_eq!(data.index("email").unwrap().mode(), IndexMode::Both);
        assert_eq!(data.index("id").unwrap().mode(), IndexMode::Ordered);
    }

    #[test]
    fn test_table_created_on_first_access() {
        let mut store = TableStore::new();
        let schema = users_schema();
        assert!(store.table("users").is_none());

        let data = store.table_mut(&schema);
        data.records
            .insert(crate::types::FieldValue::Number(1.0), json!({"id": 1}));
        assert_eq!(store.table("users").unwrap().len(), 1);
    }

    #[test]
    fn test_all_ids() {
        let mut store = TableStore::new();
        let schema = users_schema();
        let data = store.table_mut(&schema);
        for i in 1..=3 {
            data.records.insert(
                crate::types::FieldValue::Number(i as f64),
                json!({"id": i}),
            );
        }
        assert_eq!(data.all_ids().len(), 3);
    }
}
