//! Core types: column types, schema definitions, and the tagged field value
//! used for index keys, identifiers, and ordered comparisons.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Number,
    Text,
    Boolean,
    /// Epoch milliseconds; ordered numerically.
    Date,
    /// Arbitrary nested JSON; compared by equality only.
    Structured,
}

/// Per-column metadata: value type plus constraint flags.
///
/// Descriptors are supplied at schema-registration time and are read-only to
/// the engine thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary: bool,
    pub unique: bool,
    pub indexed: bool,
    /// Applied by `save` when the record carries no value for this column.
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary: false,
            unique: false,
            indexed: false,
            default: None,
        }
    }

    /// Mark this column as the table's primary identifier.
    ///
    /// Primary columns are implicitly unique and indexed.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self.indexed = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Schema definition for a table: a name plus an ordered column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// The column flagged `primary`, if any.
    pub fn primary_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary)
    }

    /// Look up a column descriptor by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All columns flagged `indexed`.
    pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.indexed)
    }

    /// All columns flagged `unique`.
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.unique)
    }
}

/// An explicit table-name → schema map handed to the engine at construction.
///
/// There is no process-global registry; two engine instances can carry
/// entirely different schema sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSet {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table schema, replacing any previous one with the same name.
    pub fn with(mut self, schema: TableSchema) -> Self {
        self.tables.insert(schema.name.clone(), schema);
        self
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }
}

impl FromIterator<TableSchema> for SchemaSet {
    fn from_iter<I: IntoIterator<Item = TableSchema>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), SchemaSet::with)
    }
}

/// A typed field value with a total ordering.
///
/// Used as the key type of secondary indexes, as the record identifier, and
/// for the order stage's comparisons. Numbers order by `f64::total_cmp`;
/// structured values carry their canonical JSON text and compare by it.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(i64),
    Structured(String),
}

/// A record's identifier: the value of its primary column.
pub type RecordId = FieldValue;

impl FieldValue {
    /// Convert a JSON value according to the declared column type.
    ///
    /// Returns `None` when the JSON value does not fit the type; `Null` JSON
    /// always converts to `FieldValue::Null`.
    pub fn from_json(value: &Value, column_type: ColumnType) -> Option<Self> {
        if value.is_null() {
            return Some(FieldValue::Null);
        }
        match column_type {
            ColumnType::Number => value.as_f64().map(FieldValue::Number),
            ColumnType::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
            ColumnType::Boolean => value.as_bool().map(FieldValue::Bool),
            ColumnType::Date => value.as_i64().map(FieldValue::Date),
            ColumnType::Structured => Some(FieldValue::Structured(value.to_string())),
        }
    }

    /// Like `from_json`, but a type-mismatched value degrades to `Null`
    /// instead of failing. Index maintenance uses this so that every record
    /// is filed under exactly one key for every indexed column.
    pub fn from_json_lossy(value: &Value, column_type: ColumnType) -> Self {
        Self::from_json(value, column_type).unwrap_or(FieldValue::Null)
    }

    /// Render back to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(ms) => Value::Number((*ms).into()),
            FieldValue::Structured(s) => serde_json::from_str(s).unwrap_or(Value::Null),
        }
    }

    /// Stable string form used as the per-record key in persisted snapshots.
    pub fn storage_key(&self) -> String {
        match self {
            FieldValue::Null => "_:null".to_string(),
            FieldValue::Bool(b) => format!("b:{b}"),
            FieldValue::Number(n) => format!("n:{n}"),
            FieldValue::Text(s) => format!("t:{s}"),
            FieldValue::Date(ms) => format!("d:{ms}"),
            FieldValue::Structured(s) => format!("s:{s}"),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Number(_) => 2,
            FieldValue::Text(_) => 3,
            FieldValue::Date(_) => 4,
            FieldValue::Structured(_) => 5,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "'{s}'"),
            FieldValue::Date(ms) => write!(f, "{ms}"),
            FieldValue::Structured(s) => write!(f, "{s}"),
        }
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.cmp(b),
            (FieldValue::Structured(a), FieldValue::Structured(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            FieldValue::Null => {}
            FieldValue::Bool(b) => b.hash(state),
            FieldValue::Number(n) => n.to_bits().hash(state),
            FieldValue::Text(s) => s.hash(state),
            FieldValue::Date(ms) => ms.hash(state),
            FieldValue::Structured(s) => s.hash(state),
        }
    }
}
