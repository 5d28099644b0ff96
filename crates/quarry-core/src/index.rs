//! Secondary indexes: per-column value → identifier-set maps.
//!
//! Each index maintains an ordered representation (BTreeMap), a hashed
//! representation (HashMap), or both, chosen at construction from the
//! column's declared type. Indexes only ever hold record identifiers; the
//! table store owns the records themselves.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::error::IndexError;
use crate::types::{ColumnType, FieldValue, RecordId};

/// How an index can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Exact, greater-than, less-than, and inclusive-range lookups.
    Ordered,
    /// Exact lookup only.
    Hashed,
    /// Both representations maintained simultaneously.
    Both,
}

impl IndexMode {
    /// Pick the lookup mode for a column type.
    ///
    /// Textual values get both representations (equality and ordering are
    /// both cheap and useful); booleans and structured values are only ever
    /// compared by equality.
    pub fn for_column(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Number | ColumnType::Date => IndexMode::Ordered,
            ColumnType::Text => IndexMode::Both,
            ColumnType::Boolean | ColumnType::Structured => IndexMode::Hashed,
        }
    }
}

/// A secondary index over one column of one table.
///
/// The index is a plain value → identifier-set structure; constraints such
/// as uniqueness are the mutation engine's concern, checked against the
/// records before any index is touched. `add` and `remove` cannot fail.
#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    column: String,
    mode: IndexMode,
    ordered: BTreeMap<FieldValue, BTreeSet<RecordId>>,
    hashed: HashMap<FieldValue, BTreeSet<RecordId>>,
}

impl SecondaryIndex {
    pub fn new(column: impl Into<String>, mode: IndexMode) -> Self {
        Self {
            column: column.into(),
            mode,
            ordered: BTreeMap::new(),
            hashed: HashMap::new(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Whether this index can answer greater-than/less-than/range lookups.
    pub fn supports_ordering(&self) -> bool {
        matches!(self.mode, IndexMode::Ordered | IndexMode::Both)
    }

    /// Insert `id` under `value` in every maintained representation.
    pub fn add(&mut self, value: FieldValue, id: RecordId) {
        if self.mode != IndexMode::Hashed {
            self.ordered
                .entry(value.clone())
                .or_default()
                .insert(id.clone());
        }
        if self.mode != IndexMode::Ordered {
            self.hashed.entry(value).or_default().insert(id);
        }
    }

    /// Delete `id` from the set for `value`. Value entries whose set becomes
    /// empty are dropped entirely, so sparse value spaces stay bounded.
    pub fn remove(&mut self, value: &FieldValue, id: &RecordId) {
        if let Some(ids) = self.ordered.get_mut(value) {
            ids.remove(id);
            if ids.is_empty() {
                self.ordered.remove(value);
            }
        }
        if let Some(ids) = self.hashed.get_mut(value) {
            ids.remove(id);
            if ids.is_empty() {
                self.hashed.remove(value);
            }
        }
    }

    /// Identifiers currently filed under exactly `value`.
    pub fn find_equal(&self, value: &FieldValue) -> BTreeSet<RecordId> {
        let set = if self.mode == IndexMode::Hashed {
            self.hashed.get(value)
        } else {
            self.ordered.get(value)
        };
        set.cloned().unwrap_or_default()
    }

    /// Identifiers filed under values strictly greater than `value`.
    pub fn find_greater_than(&self, value: &FieldValue) -> Result<BTreeSet<RecordId>, IndexError> {
        let ordered = self.require_ordered()?;
        Ok(collect_range(
            ordered.range((Bound::Excluded(value), Bound::Unbounded)),
        ))
    }

    /// Identifiers filed under values strictly less than `value`.
    pub fn find_less_than(&self, value: &FieldValue) -> Result<BTreeSet<RecordId>, IndexError> {
        let ordered = self.require_ordered()?;
        Ok(collect_range(
            ordered.range((Bound::Unbounded, Bound::Excluded(value))),
        ))
    }

    /// Identifiers filed under values in `[lo, hi]`, inclusive at both ends.
    pub fn find_range(
        &self,
        lo: &FieldValue,
        hi: &FieldValue,
    ) -> Result<BTreeSet<RecordId>, IndexError> {
        let ordered = self.require_ordered()?;
        if lo > hi {
            return Ok(BTreeSet::new());
        }
        Ok(collect_range(
            ordered.range((Bound::Included(lo), Bound::Included(hi))),
        ))
    }

    /// Drop every entry, keeping the mode and uniqueness flag.
    pub fn clear(&mut self) {
        self.ordered.clear();
        self.hashed.clear();
    }

    fn require_ordered(
        &self,
    ) -> Result<&BTreeMap<FieldValue, BTreeSet<RecordId>>, IndexError> {
        if self.supports_ordering() {
            Ok(&self.ordered)
        } else {
            Err(IndexError::UnsupportedOperation {
                column: self.column.clone(),
            })
        }
    }
}

fn collect_range<'a>(
    range: impl Iterator<Item = (&'a FieldValue, &'a BTreeSet<RecordId>)>,
) -> BTreeSet<RecordId> {
    range.flat_map(|(_, ids)| ids.iter().cloned()).collect()
}
