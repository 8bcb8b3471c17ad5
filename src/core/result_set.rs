//! Raw driver results and the legacy result-set shape
//!
//! Drivers hand back a [`RawResult`] (column names plus positional rows). The
//! transaction controller turns it into a [`ResultSet`] before any callback
//! sees it.

use super::error::{DatabaseError, Result};
use super::value::{Row, SqlValue};
use serde::Serialize;

/// Tabular result as produced by a driver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    /// Column names in engine order
    pub columns: Vec<String>,
    /// Rows as positional values, one per column
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows changed by a mutating statement
    pub rows_affected: u64,
    /// Row id of the inserted row, for statements that inserted one
    pub insert_id: Option<i64>,
}

impl RawResult {
    /// Result of a statement that returns nothing
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result of one statement, in the shape the legacy API exposes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    rows: Vec<Row>,
    rows_affected: u64,
    insert_id: Option<i64>,
}

impl ResultSet {
    /// Number of rows returned
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row at `index`, the legacy `rows.item(i)` accessor
    pub fn item(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// All rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume the result set, keeping the rows
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Rows changed by the statement (0 for queries)
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Id of the inserted row, if the statement inserted one
    pub fn insert_id(&self) -> Option<i64> {
        self.insert_id
    }

    /// Legacy JSON shape: `{ rows, rowsAffected, insertId }`
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| DatabaseError::other(format!("Result serialization failed: {}", e)))
    }
}

impl TryFrom<RawResult> for ResultSet {
    type Error = DatabaseError;

    fn try_from(raw: RawResult) -> Result<Self> {
        let width = raw.columns.len();
        let mut rows = Vec::with_capacity(raw.rows.len());

        for (index, values) in raw.rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(DatabaseError::malformed(format!(
                    "row {} has {} values for {} columns",
                    index,
                    values.len(),
                    width
                )));
            }

            let mut row = Row::with_capacity(width);
            for (column, value) in raw.columns.iter().zip(values) {
                row.insert(column.as_str(), value);
            }
            rows.push(row);
        }

        Ok(ResultSet {
            rows,
            rows_affected: raw.rows_affected,
            insert_id: raw.insert_id,
        })
    }
}

/// Shape a raw driver result into a [`ResultSet`]
pub fn adapt(raw: RawResult) -> Result<ResultSet> {
    ResultSet::try_from(raw)
}
