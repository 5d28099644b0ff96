//! Condition trees and the predicate evaluator.
//!
//! A condition is either a simple `(field, operator, value)` triple or a
//! boolean composite over sub-conditions. Evaluation works in identifier
//! sets: simple conditions resolve through a secondary index when one can
//! answer the operator, otherwise by a full scan; composites combine their
//! sub-results with set algebra.
//!
//! Referencing a field absent from the schema is not an error — the
//! condition simply matches nothing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::store::TableData;
use crate::types::{ColumnType, FieldValue, RecordId, TableSchema};

/// Comparison operator of a simple condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Literal substring containment (not a wildcard pattern).
    Like,
    In,
    Nin,
    /// Inclusive range; the value is a two-element list `[lo, hi]`.
    Between,
    Exists,
    Null,
    /// Element membership when the field holds a list; substring for strings.
    Contains,
    StartsWith,
    EndsWith,
}

/// Boolean combinator of a composite condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
    /// One-operand negation: only the first sub-condition participates.
    Not,
}

/// A predicate over a table's records.
///
/// Serializable so query options can travel over a wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Simple {
        field: String,
        operator: Operator,
        value: Value,
    },
    Composite {
        op: BoolOp,
        conditions: Vec<Condition>,
    },
}

impl Condition {
    pub fn simple(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Condition::Simple {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Ne, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Gt, value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Gte, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Lt, value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(field, Operator::Lte, value)
    }

    /// `lo <= field <= hi`
    pub fn between(
        field: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        Self::simple(field, Operator::Between, Value::Array(vec![lo.into(), hi.into()]))
    }

    /// `expr1 AND expr2 AND ...`
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::Composite {
            op: BoolOp::And,
            conditions,
        }
    }

    /// `expr1 OR expr2 OR ...`
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Composite {
            op: BoolOp::Or,
            conditions,
        }
    }

    /// `NOT expr`
    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Composite {
            op: BoolOp::Not,
            conditions: vec![condition],
        }
    }
}

/// Evaluate a condition to the set of matching record identifiers.
pub(crate) fn evaluate(
    condition: &Condition,
    data: &TableData,
    schema: &TableSchema,
) -> Result<BTreeSet<RecordId>> {
    match condition {
        Condition::Simple {
            field,
            operator,
            value,
        } => evaluate_simple(field, *operator, value, data, schema),
        Condition::Composite { op, conditions } => {
            match op {
                BoolOp::And => {
                    let mut result: Option<BTreeSet<RecordId>> = None;
                    for cond in conditions {
                        let ids = evaluate(cond, data, schema)?;
                        result = Some(match result {
                            Some(acc) => acc.intersection(&ids).cloned().collect(),
                            None => ids,
                        });
                    }
                    // Empty AND is vacuously true.
                    Ok(result.unwrap_or_else(|| data.all_ids()))
                }
                BoolOp::Or => {
                    let mut result = BTreeSet::new();
                    for cond in conditions {
                        result.extend(evaluate(cond, data, schema)?);
                    }
                    Ok(result)
                }
                BoolOp::Not => {
                    let mut all = data.all_ids();
                    if let Some(first) = conditions.first() {
                        for id in evaluate(first, data, schema)? {
                            all.remove(&id);
                        }
                    }
                    Ok(all)
                }
            }
        }
    }
}

fn evaluate_simple(
    field: &str,
    operator: Operator,
    value: &Value,
    data: &TableData,
    schema: &TableSchema,
) -> Result<BTreeSet<RecordId>> {
    // Unknown fields degrade to empty results instead of aborting.
    let Some(column) = schema.column(field) else {
        return Ok(BTreeSet::new());
    };

    if let Some(index) = data.index(field) {
        match operator {
            Operator::Eq => {
                if let Some(key) = FieldValue::from_json(value, column.column_type) {
                    return Ok(index.find_equal(&key));
                }
            }
            Operator::Gt if index.supports_ordering() => {
                if let Some(key) = FieldValue::from_json(value, column.column_type) {
                    // Null never participates in ordered comparison.
                    if key == FieldValue::Null {
                        return Ok(BTreeSet::new());
                    }
                    return Ok(index.find_greater_than(&key)?);
                }
            }
            Operator::Lt if index.supports_ordering() => {
                if let Some(key) = FieldValue::from_json(value, column.column_type) {
                    return Ok(index.find_less_than(&key)?);
                }
            }
            Operator::Between if index.supports_ordering() => {
                if let Some((lo, hi)) = between_bounds(value, column.column_type) {
                    return Ok(index.find_range(&lo, &hi)?);
                }
                // Malformed bounds match nothing, same as the scan path.
                return Ok(BTreeSet::new());
            }
            _ => {}
        }
    }

    // Full scan fallback.
    Ok(data
        .records
        .iter()
        .filter(|(_, record)| matches_record(record, field, operator, value, column.column_type))
        .map(|(id, _)| id.clone())
        .collect())
}

fn between_bounds(value: &Value, column_type: ColumnType) -> Option<(FieldValue, FieldValue)> {
    let bounds = value.as_array()?;
    if bounds.len() != 2 {
        return None;
    }
    let lo = FieldValue::from_json(&bounds[0], column_type)?;
    let hi = FieldValue::from_json(&bounds[1], column_type)?;
    Some((lo, hi))
}

/// Apply one operator to one record during a full scan.
pub(crate) fn matches_record(
    record: &Value,
    field: &str,
    operator: Operator,
    value: &Value,
    column_type: ColumnType,
) -> bool {
    let field_json = record.get(field).unwrap_or(&Value::Null);

    match operator {
        Operator::Eq => typed_eq(field_json, value, column_type),
        Operator::Ne => !typed_eq(field_json, value, column_type),
        Operator::Gt => typed_cmp(field_json, value, column_type)
            .is_some_and(|o| o == std::cmp::Ordering::Greater),
        Operator::Gte => typed_cmp(field_json, value, column_type)
            .is_some_and(|o| o != std::cmp::Ordering::Less),
        Operator::Lt => typed_cmp(field_json, value, column_type)
            .is_some_and(|o| o == std::cmp::Ordering::Less),
        Operator::Lte => typed_cmp(field_json, value, column_type)
            .is_some_and(|o| o != std::cmp::Ordering::Greater),
        Operator::Like => match (field_json.as_str(), value.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        Operator::In => in_list(field_json, value, column_type),
        Operator::Nin => !in_list(field_json, value, column_type),
        Operator::Between => match between_bounds(value, column_type) {
            Some((lo, hi)) => {
                let v = FieldValue::from_json_lossy(field_json, column_type);
                v >= lo && v <= hi
            }
            None => false,
        },
        Operator::Exists => {
            record
                .as_object()
                .is_some_and(|obj| obj.get(field).is_some_and(|v| !v.is_null()))
        }
        Operator::Null => field_json.is_null(),
        Operator::Contains => match field_json {
            Value::Array(items) => items.contains(value),
            Value::String(s) => value.as_str().is_some_and(|needle| s.contains(needle)),
            _ => false,
        },
        Operator::StartsWith => match (field_json.as_str(), value.as_str()) {
            (Some(s), Some(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        Operator::EndsWith => match (field_json.as_str(), value.as_str()) {
            (Some(s), Some(suffix)) => s.ends_with(suffix),
            _ => false,
        },
    }
}

/// Typed membership: list elements convert under the column type, so
/// `25` and `25.0` are the same number.
fn in_list(field_json: &Value, list: &Value, column_type: ColumnType) -> bool {
    let Some(items) = list.as_array() else {
        return false;
    };
    let Some(field) = FieldValue::from_json(field_json, column_type) else {
        return false;
    };
    items
        .iter()
        .any(|item| FieldValue::from_json(item, column_type).is_some_and(|v| v == field))
}

/// The stored value converts lossily, matching how the index files it, so a
/// type-mismatched value compares as null on both paths.
fn typed_eq(field_json: &Value, literal: &Value, column_type: ColumnType) -> bool {
    match FieldValue::from_json(literal, column_type) {
        Some(literal) => FieldValue::from_json_lossy(field_json, column_type) == literal,
        None => false,
    }
}

fn typed_cmp(
    field_json: &Value,
    literal: &Value,
    column_type: ColumnType,
) -> Option<std::cmp::Ordering> {
    let a = FieldValue::from_json(field_json, column_type)?;
    let b = FieldValue::from_json(literal, column_type)?;
    // Null never participates in ordered comparison.
    if a == FieldValue::Null || b == FieldValue::Null {
        return None;
    }
    Some(a.cmp(&b))
}
