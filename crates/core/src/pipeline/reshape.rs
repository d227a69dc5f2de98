use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// A wide-form row: one key plus named value columns.
pub trait WideRecord {
    type Key: Clone;
    type Value: Clone;

    fn key(&self) -> Self::Key;

    /// `None` when the record has no such column.
    fn value(&self, column: &str) -> Option<Self::Value>;
}

/// A value column to melt and the category label its values get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueColumn<'a> {
    pub column: &'a str,
    pub category: &'a str,
}

impl<'a> ValueColumn<'a> {
    pub const fn new(column: &'a str, category: &'a str) -> Self {
        Self { column, category }
    }

    /// Uses the column name as the category label.
    pub const fn named(column: &'a str) -> Self {
        Self {
            column,
            category: column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongFormRow<K, V> {
    pub key: K,
    pub category: String,
    pub value: V,
}

/// Long-form rows together with the column names a chart should use for
/// the key, the category and the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongFormTable<K, V> {
    pub id_column: String,
    pub category_column: String,
    pub value_column: String,
    pub rows: Vec<LongFormRow<K, V>>,
}

impl<K, V> LongFormTable<K, V> {
    pub fn with_names(mut self, category_column: &str, value_column: &str) -> Self {
        self.category_column = category_column.to_string();
        self.value_column = value_column.to_string();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Emits one row per (record, value column): record order first, then column
/// order. Nothing is aggregated.
pub fn melt<R: WideRecord>(
    records: &[R],
    id_column: &str,
    value_columns: &[ValueColumn<'_>],
) -> PipelineResult<LongFormTable<R::Key, R::Value>> {
    let mut rows = Vec::with_capacity(records.len() * value_columns.len());
    for record in records {
        let key = record.key();
        for col in value_columns {
            let value = record
                .value(col.column)
                .ok_or_else(|| PipelineError::missing_column(col.column))?;
            rows.push(LongFormRow {
                key: key.clone(),
                category: col.category.to_string(),
                value,
            });
        }
    }

    Ok(LongFormTable {
        id_column: id_column.to_string(),
        category_column: "category".to_string(),
        value_column: "value".to_string(),
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow<K, V> {
    pub key: K,
    pub values: Vec<(String, V)>,
}

impl<K: Clone, V: Clone> WideRecord for WideRow<K, V> {
    type Key = K;
    type Value = V;

    fn key(&self) -> K {
        self.key.clone()
    }

    fn value(&self, column: &str) -> Option<V> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.clone())
    }
}

/// Inverse of [`melt`]: groups rows by key, keys in order of first
/// appearance and categories in row order.
pub fn pivot<K: Ord + Clone, V: Clone>(table: &LongFormTable<K, V>) -> Vec<WideRow<K, V>> {
    let mut index: BTreeMap<K, usize> = BTreeMap::new();
    let mut out: Vec<WideRow<K, V>> = Vec::new();
    for row in &table.rows {
        let slot = *index.entry(row.key.clone()).or_insert_with(|| {
            out.push(WideRow {
                key: row.key.clone(),
                values: Vec::new(),
            });
            out.len() - 1
        });
        out[slot]
            .values
            .push((row.category.clone(), row.value.clone()));
    }
    out
}
