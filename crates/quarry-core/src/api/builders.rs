//! Fluent query builder.
//!
//! `FindBuilder` only accumulates a `QueryOptions` value through chained
//! calls and hands it to the pipeline on `execute()`; it carries no query
//! logic of its own.

use serde_json::Value;

use crate::condition::Condition;
use crate::error::Result;
use crate::query::{Aggregate, Direction, GroupSpec, JoinSpec, OrderSpec, QueryOptions};

use super::database::QuarryDB;

/// Builder for a single read against one table.
pub struct FindBuilder<'a> {
    db: &'a QuarryDB,
    table: String,
    options: QueryOptions,
}

impl<'a> FindBuilder<'a> {
    pub(crate) fn new(db: &'a QuarryDB, table: String) -> Self {
        Self {
            db,
            table,
            options: QueryOptions::default(),
        }
    }

    /// Set the predicate. Replaces any previously set one.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.options.filter = Some(condition);
        self
    }

    /// Add a join.
    pub fn join(mut self, spec: JoinSpec) -> Self {
        self.options.joins.push(spec);
        self
    }

    /// Add an inner join on `other.field == local id`.
    pub fn inner_join(self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.join(JoinSpec::inner(table, field))
    }

    /// Add a left join on `other.field == local id`.
    pub fn left_join(self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.join(JoinSpec::left(table, field))
    }

    /// Add a grouping key.
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.options.group_by.push(GroupSpec::by(field));
        self
    }

    /// Add a grouping key with an aggregate computed over each group.
    pub fn aggregate(mut self, field: impl Into<String>, aggregate: Aggregate) -> Self {
        self.options.group_by.push(GroupSpec::with(field, aggregate));
        self
    }

    /// Add a sort key; keys apply in the order added.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.options.order_by.push(OrderSpec {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.options.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.options.offset = Some(offset);
        self
    }

    /// Project each output row to the listed fields, in listed order.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Run the query.
    pub fn execute(self) -> Result<Vec<Value>> {
        self.db.find(&self.table, &self.options)
    }
}
