//! The mutation path: save/remove with identifier resolution, uniqueness
//! enforcement, and incremental index maintenance.
//!
//! All checks run before any state is touched; a failed mutation leaves the
//! table store and every index exactly as they were.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, IndexError, Result, SchemaError, ValueError};
use crate::store::TableData;
use crate::types::{ColumnType, FieldValue, RecordId, TableSchema};

/// Insert or fully replace a record. Returns the record's identifier.
///
/// A missing primary value is generated: a monotonic per-table counter for
/// `Number` primaries, a UUIDv4 for `Text` primaries. On update, the prior
/// record's indexed values are removed before the new ones are added, so no
/// identifier ever dangles under a stale value.
pub(crate) fn save(
    schema: &TableSchema,
    data: &mut TableData,
    mut record: Value,
) -> Result<RecordId> {
    if !record.is_object() {
        return Err(ValueError::NotAnObject.into());
    }

    let primary = schema
        .primary_column()
        .ok_or_else(|| SchemaError::NoPrimaryColumn(schema.name.clone()))?
        .clone();

    apply_defaults(schema, &mut record);
    let id = resolve_id(&primary, data, &mut record)?;

    // Uniqueness: no *other* record may already hold an equal value.
    for col in schema.unique_columns() {
        let candidate =
            FieldValue::from_json_lossy(record.get(&col.name).unwrap_or(&Value::Null), col.column_type);
        if candidate == FieldValue::Null {
            // Absent values never conflict.
            continue;
        }
        let taken = data.records.iter().any(|(other_id, other)| {
            *other_id != id
                && FieldValue::from_json_lossy(
                    other.get(&col.name).unwrap_or(&Value::Null),
                    col.column_type,
                ) == candidate
        });
        if taken {
            return Err(IndexError::UniqueViolation {
                column: col.name.clone(),
                value: candidate.to_string(),
            }
            .into());
        }
    }

    // All checks have passed; nothing below can fail, so a rejected save
    // never leaves a partially updated index behind.
    //
    // Evict the prior record's values first, then file the new ones.
    let old = data.records.get(&id).cloned();
    for col in schema.indexed_columns() {
        let Some(index) = data.indexes.get_mut(&col.name) else {
            continue;
        };
        if let Some(old_record) = &old {
            let old_value = FieldValue::from_json_lossy(
                old_record.get(&col.name).unwrap_or(&Value::Null),
                col.column_type,
            );
            index.remove(&old_value, &id);
        }
        let new_value = FieldValue::from_json_lossy(
            record.get(&col.name).unwrap_or(&Value::Null),
            col.column_type,
        );
        index.add(new_value, id.clone());
    }

    data.records.insert(id.clone(), record);
    debug!(table = %schema.name, id = %id, "saved record");
    Ok(id)
}

/// Delete a record. The caller supplies the pre-removal record; its current
/// field values drive index eviction.
pub(crate) fn remove(
    schema: &TableSchema,
    data: &mut TableData,
    record: &Value,
) -> Result<RecordId> {
    let primary = schema
        .primary_column()
        .ok_or_else(|| SchemaError::NoPrimaryColumn(schema.name.clone()))?;

    let primary_value = record.get(&primary.name).filter(|v| !v.is_null()).ok_or(
        ValueError::MissingId {
            column: primary.name.clone(),
        },
    )?;
    let id = FieldValue::from_json(primary_value, primary.column_type)
        .filter(|v| *v != FieldValue::Null)
        .ok_or(ValueError::IdTypeMismatch {
            column: primary.name.clone(),
        })?;

    for col in schema.indexed_columns() {
        if let Some(index) = data.indexes.get_mut(&col.name) {
            let value = FieldValue::from_json_lossy(
                record.get(&col.name).unwrap_or(&Value::Null),
                col.column_type,
            );
            index.remove(&value, &id);
        }
    }

    data.records.remove(&id);
    debug!(table = %schema.name, id = %id, "removed record");
    Ok(id)
}

/// Rebuild every index from the table's current records and re-seed the id
/// counter. Used after a snapshot load.
pub(crate) fn rebuild_indexes(schema: &TableSchema, data: &mut TableData) {
    data.indexes = TableData::for_schema(schema).indexes;
    data.next_id = 1;

    let ids: Vec<RecordId> = data.records.keys().cloned().collect();
    for id in ids {
        if let FieldValue::Number(n) = id {
            if n >= data.next_id as f64 {
                data.next_id = n as u64 + 1;
            }
        }
        let record = data.records.get(&id).cloned().unwrap_or(Value::Null);
        for col in schema.indexed_columns() {
            if let Some(index) = data.indexes.get_mut(&col.name) {
                let value = FieldValue::from_json_lossy(
                    record.get(&col.name).unwrap_or(&Value::Null),
                    col.column_type,
                );
                index.add(value, id.clone());
            }
        }
    }
    debug!(table = %schema.name, records = data.records.len(), "rebuilt indexes");
}

fn apply_defaults(schema: &TableSchema, record: &mut Value) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    for col in &schema.columns {
        if let Some(default) = &col.default {
            if !obj.contains_key(&col.name) {
                obj.insert(col.name.clone(), default.clone());
            }
        }
    }
}

/// Resolve the record's identifier, generating one when the primary value is
/// absent. Keeps the numeric counter ahead of any explicitly supplied id.
fn resolve_id(
    primary: &crate::types::ColumnDef,
    data: &mut TableData,
    record: &mut Value,
) -> Result<RecordId> {
    let existing = record
        .get(&primary.name)
        .filter(|v| !v.is_null())
        .cloned();

    let value = match existing {
        Some(value) => value,
        None => {
            let generated = match primary.column_type {
                ColumnType::Number => {
                    while data
                        .records
                        .contains_key(&FieldValue::Number(data.next_id as f64))
                    {
                        data.next_id += 1;
                    }
                    let fresh = Value::from(data.next_id);
                    data.next_id += 1;
                    fresh
                }
                ColumnType::Text => Value::String(Uuid::new_v4().to_string()),
                _ => {
                    return Err(Error::Value(ValueError::MissingId {
                        column: primary.name.clone(),
                    }))
                }
            };
            if let Some(obj) = record.as_object_mut() {
                obj.insert(primary.name.clone(), generated.clone());
            }
            generated
        }
    };

    let id = FieldValue::from_json(&value, primary.column_type)
        .filter(|v| *v != FieldValue::Null)
        .ok_or(ValueError::IdTypeMismatch {
            column: primary.name.clone(),
        })?;

    if let FieldValue::Number(n) = id {
        if n >= data.next_id as f64 {
            data.next_id = n as u64 + 1;
        }
    }
    Ok(id)
}
