//! Column-named tabular result sets.
//!
//! Every stage of the pipeline speaks `Table`: row sources return them, the
//! view builder produces them, the aggregator and ranker transform them and
//! sinks render them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Value;

/// Errors raised by table construction and lookup.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Row has {found} values, table has {expected} columns")]
    RowWidth { expected: usize, found: usize },
}

/// An ordered set of named columns and rows of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows, checking row widths.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like `column_index`, but a missing column is an error.
    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Resolve several column names at once.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, TableError> {
        names
            .iter()
            .map(|n| self.require_column(n.as_ref()))
            .collect()
    }

    /// Value at `row` for the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>, TableError> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Copy of the table keeping rows whose `column` value passes `keep`.
    pub fn filter_rows<F>(&self, column: &str, keep: F) -> Result<Table, TableError>
    where
        F: Fn(&Value) -> bool,
    {
        let idx = self.require_column(column)?;
        Ok(Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(&row[idx]))
                .cloned()
                .collect(),
        })
    }

    /// Rows rendered as JSON objects keyed by column name.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), value_to_json(v)))
                    .collect()
            })
            .collect()
    }

    /// SHA-256 over the full content (columns, cell types and values).
    ///
    /// Two tables with the same fingerprint are byte-identical for every
    /// sink, which is how view rebuilds are checked for idempotence.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
        for row in &self.rows {
            for value in row {
                match value {
                    Value::Null => hasher.update([0u8]),
                    Value::Int(i) => {
                        hasher.update([1u8]);
                        hasher.update(i.to_le_bytes());
                    }
                    Value::Float(f) => {
                        hasher.update([2u8]);
                        hasher.update(f.to_bits().to_le_bytes());
                    }
                    Value::Text(s) => {
                        hasher.update([3u8]);
                        hasher.update((s.len() as u64).to_le_bytes());
                        hasher.update(s.as_bytes());
                    }
                }
            }
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            ["player", "kills"],
            vec![
                vec![Value::text("A"), Value::Int(10)],
                vec![Value::text("B"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_row_width_checked() {
        let mut table = Table::new(["a", "b"]);
        let err = table.push_row(vec![Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            TableError::RowWidth {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_column_lookup() {
        let table = sample();
        assert_eq!(table.column_index("kills"), Some(1));
        assert!(table.require_column("deaths").is_err());
        assert_eq!(table.get(0, "kills"), Some(&Value::Int(10)));
        assert_eq!(table.get(5, "kills"), None);
    }

    #[test]
    fn test_filter_rows() {
        let table = sample();
        let kept = table.filter_rows("player", |v| *v != Value::text("A")).unwrap();
        assert_eq!(kept.columns(), table.columns());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0, "player"), Some(&Value::text("B")));
        assert!(table.filter_rows("deaths", |_| true).is_err());
    }

    #[test]
    fn test_json_rows() {
        let rows = sample().to_json_rows();
        assert_eq!(rows[0]["player"], "A");
        assert_eq!(rows[0]["kills"], 10);
        assert!(rows[1]["kills"].is_null());
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_sees_types() {
        let a = Table::from_rows(["x"], vec![vec![Value::Int(1)]]).unwrap();
        let b = Table::from_rows(["x"], vec![vec![Value::Float(1.0)]]).unwrap();
        let c = Table::from_rows(["x"], vec![vec![Value::text("1")]]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
