//! Query options and the execution pipeline.
//!
//! Stages run in a fixed order — filter, join, group, order, paginate,
//! project — each one optional and reading only the previous stage's output.
//! There is no partial-failure mode: any error aborts the whole query.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::{evaluate, Condition, Operator};
use crate::error::{Result, SchemaError};
use crate::projection::project_row;
use crate::store::TableStore;
use crate::types::{FieldValue, SchemaSet, TableSchema};

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Rows with zero matches are dropped.
    Inner,
    /// Rows with zero matches keep a single-element `[null]` placeholder.
    Left,
}

/// An explicit join condition between the local and foreign row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOn {
    pub local_field: String,
    pub operator: Operator,
    pub foreign_field: String,
}

/// One join against another table.
///
/// Without an `on` condition, foreign rows match when their `field` equals
/// the local record's identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub table: String,
    pub field: String,
    /// Key the match list is attached under; defaults to the table name.
    pub alias: Option<String>,
    pub kind: JoinKind,
    pub on: Option<JoinOn>,
}

impl JoinSpec {
    pub fn inner(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            alias: None,
            kind: JoinKind::Inner,
            on: None,
        }
    }

    pub fn left(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Left,
            ..Self::inner(table, field)
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn on(
        mut self,
        local_field: impl Into<String>,
        operator: Operator,
        foreign_field: impl Into<String>,
    ) -> Self {
        self.on = Some(JoinOn {
            local_field: local_field.into(),
            operator,
            foreign_field: foreign_field.into(),
        });
        self
    }
}

/// Aggregate functions for the group stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Distinct,
}

impl Aggregate {
    fn name(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Distinct => "distinct",
        }
    }
}

/// One grouping key, optionally with an aggregate computed over each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub field: String,
    pub aggregate: Option<Aggregate>,
}

impl GroupSpec {
    pub fn by(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            aggregate: None,
        }
    }

    pub fn with(field: impl Into<String>, aggregate: Aggregate) -> Self {
        Self {
            field: field.into(),
            aggregate: Some(aggregate),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
}

/// An ephemeral, caller-constructed description of a single read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub filter: Option<Condition>,
    pub joins: Vec<JoinSpec>,
    pub group_by: Vec<GroupSpec>,
    pub order_by: Vec<OrderSpec>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub select: Option<Vec<String>>,
}

/// Execute a query against one table.
pub(crate) fn run(
    options: &QueryOptions,
    table: &str,
    schemas: &SchemaSet,
    store: &TableStore,
) -> Result<Vec<Value>> {
    let schema = schemas
        .get(table)
        .ok_or_else(|| SchemaError::TableNotRegistered(table.to_string()))?;

    // Filter. No predicate means the whole table.
    let mut rows: Vec<Value> = match store.table(table) {
        Some(data) => {
            let ids = match &options.filter {
                Some(condition) => evaluate(condition, data, schema)?,
                None => data.all_ids(),
            };
            ids.iter()
                .filter_map(|id| data.get(id).cloned())
                .collect()
        }
        None => Vec::new(),
    };

    for join in &options.joins {
        rows = apply_join(rows, join, schema, schemas, store)?;
    }

    if !options.group_by.is_empty() {
        rows = apply_group(rows, &options.group_by, schema);
    }

    if !options.order_by.is_empty() {
        apply_order(&mut rows, &options.order_by, schema);
    }

    rows = paginate(rows, options.page, options.limit, options.offset);

    if let Some(fields) = &options.select {
        rows = rows.iter().map(|row| project_row(row, fields)).collect();
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

fn apply_join(
    rows: Vec<Value>,
    join: &JoinSpec,
    schema: &TableSchema,
    schemas: &SchemaSet,
    store: &TableStore,
) -> Result<Vec<Value>> {
    // The joined table must be registered, even if it holds no data yet.
    schemas
        .get(&join.table)
        .ok_or_else(|| SchemaError::TableNotRegistered(join.table.clone()))?;

    let foreign: Vec<&Value> = store
        .table(&join.table)
        .map(|data| data.records.values().collect())
        .unwrap_or_default();

    let primary = schema.primary_column();
    let alias = join.alias.as_deref().unwrap_or(&join.table);
    let mut out = Vec::with_capacity(rows.len());

    for mut row in rows {
        let matches: Vec<Value> = foreign
            .iter()
            .filter(|other| match &join.on {
                Some(on) => join_on_matches(&row, other, on),
                None => match primary {
                    Some(pk) => {
                        let local_id = FieldValue::from_json_lossy(
                            row.get(&pk.name).unwrap_or(&Value::Null),
                            pk.column_type,
                        );
                        local_id != FieldValue::Null
                            && FieldValue::from_json_lossy(
                                other.get(&join.field).unwrap_or(&Value::Null),
                                pk.column_type,
                            ) == local_id
                    }
                    None => false,
                },
            })
            .map(|other| (*other).clone())
            .collect();

        let attached = if matches.is_empty() {
            match join.kind {
                JoinKind::Inner => continue,
                JoinKind::Left => vec![Value::Null],
            }
        } else {
            matches
        };

        if let Some(obj) = row.as_object_mut() {
            obj.insert(alias.to_string(), Value::Array(attached));
        }
        out.push(row);
    }
    Ok(out)
}

fn join_on_matches(local: &Value, foreign: &Value, on: &JoinOn) -> bool {
    let a = local.get(&on.local_field).unwrap_or(&Value::Null);
    let b = foreign.get(&on.foreign_field).unwrap_or(&Value::Null);
    match on.operator {
        Operator::Eq => a == b,
        Operator::Ne => a != b,
        Operator::Gt => compare_json(a, b) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_json(a, b),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare_json(a, b) == Some(Ordering::Less),
        Operator::Lte => matches!(compare_json(a, b), Some(Ordering::Less | Ordering::Equal)),
        // Remaining operators have no pairwise meaning; no match.
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

fn apply_group(rows: Vec<Value>, specs: &[GroupSpec], schema: &TableSchema) -> Vec<Value> {
    // Composite key by field-value concatenation; groups keep first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();

    for row in rows {
        let key = specs
            .iter()
            .map(|spec| row.get(&spec.field).unwrap_or(&Value::Null).to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    order
        .into_iter()
        .map(|key| {
            let members = &groups[&key];
            let mut out = Map::new();
            for spec in specs {
                let value = members[0].get(&spec.field).cloned().unwrap_or(Value::Null);
                out.insert(spec.field.clone(), value);
            }
            for spec in specs {
                if let Some(aggregate) = spec.aggregate {
                    let name = format!("{}_{}", aggregate.name(), spec.field);
                    out.insert(name, compute_aggregate(aggregate, &spec.field, members, schema));
                }
            }
            Value::Object(out)
        })
        .collect()
}

fn compute_aggregate(
    aggregate: Aggregate,
    field: &str,
    members: &[Value],
    schema: &TableSchema,
) -> Value {
    let values: Vec<&Value> = members
        .iter()
        .map(|m| m.get(field).unwrap_or(&Value::Null))
        .collect();

    match aggregate {
        Aggregate::Count => Value::from(members.len()),
        Aggregate::Sum | Aggregate::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if aggregate == Aggregate::Sum {
                Value::from(numbers.iter().sum::<f64>())
            } else if numbers.is_empty() {
                Value::Null
            } else {
                Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Aggregate::Min | Aggregate::Max => {
            let mut best: Option<&Value> = None;
            for value in values.iter().filter(|v| !v.is_null()) {
                best = Some(match best {
                    None => value,
                    Some(current) => {
                        let ord = compare_field(current, value, field, schema);
                        let replace = if aggregate == Aggregate::Min {
                            ord == Ordering::Greater
                        } else {
                            ord == Ordering::Less
                        };
                        if replace {
                            value
                        } else {
                            current
                        }
                    }
                });
            }
            best.cloned().unwrap_or(Value::Null)
        }
        Aggregate::Distinct => {
            // De-duplicated, first-seen order preserved.
            let mut seen: Vec<Value> = Vec::new();
            for value in values {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
            Value::Array(seen)
        }
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

fn apply_order(rows: &mut [Value], specs: &[OrderSpec], schema: &TableSchema) {
    // Vec::sort_by is stable; ties keep the input order.
    rows.sort_by(|a, b| {
        for spec in specs {
            let av = a.get(&spec.field).unwrap_or(&Value::Null);
            let bv = b.get(&spec.field).unwrap_or(&Value::Null);
            let mut ord = compare_field(av, bv, &spec.field, schema);
            if spec.direction == Direction::Desc {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Compare two JSON values under the column's declared ordering when the
/// field is a schema column, falling back to untyped JSON ordering for
/// synthesized fields (aggregates, join attachments).
fn compare_field(a: &Value, b: &Value, field: &str, schema: &TableSchema) -> Ordering {
    if let Some(col) = schema.column(field) {
        let fa = FieldValue::from_json_lossy(a, col.column_type);
        let fb = FieldValue::from_json_lossy(b, col.column_type);
        return fa.cmp(&fb);
    }
    compare_json(a, b).unwrap_or(Ordering::Equal)
}

/// Untyped JSON comparison: numbers, strings, booleans; `None` for
/// mismatched or non-scalar types.
fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(x), Value::Number(y)) => Some(x.as_f64()?.total_cmp(&y.as_f64()?)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Paginate
// ---------------------------------------------------------------------------

/// Resolve `(page, limit, offset)` to a skip/take slice, clipped to the
/// available length. An explicit offset wins over page arithmetic.
fn paginate(
    rows: Vec<Value>,
    page: Option<usize>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Vec<Value> {
    let skip = match (offset, page, limit) {
        (Some(offset), _, _) => offset,
        (None, Some(page), Some(limit)) => page.saturating_sub(1) * limit,
        _ => 0,
    };
    let take = limit.unwrap_or(usize::MAX);
    rows.into_iter().skip(skip).take(take).collect()
}
