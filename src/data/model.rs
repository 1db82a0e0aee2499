use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a table
// ---------------------------------------------------------------------------

/// A typed cell. Which variant a column holds is fixed by its [`ColumnKind`],
/// except that any cell may be `Missing`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Timestamp(NaiveDateTime),
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Numeric view of the cell; `None` for anything but a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Timestamp(ts) if ts.time() == NaiveTime::MIN => {
                write!(f, "{}", ts.format("%Y-%m-%d"))
            }
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{v:.0}"),
            CellValue::Number(v) => {
                let text = format!("{v:.4}");
                let trimmed = text.trim_end_matches('0').trim_end_matches('.');
                // Very large or tiny magnitudes switch to exponent form.
                if v.abs() >= 1e15 || trimmed == "0" || trimmed == "-0" {
                    write!(f, "{v:e}")
                } else {
                    f.write_str(trimmed)
                }
            }
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Missing => write!(f, "NA"),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnKind {
    Timestamp,
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered column list plus the positions of the two role columns every
/// table carries: the observation timestamp and the location (city).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    timestamp: usize,
    location: usize,
}

impl Schema {
    /// Build a schema. Returns `None` when either role index is out of range
    /// or both roles point at the same column.
    pub fn new(columns: Vec<Column>, timestamp: usize, location: usize) -> Option<Self> {
        if timestamp >= columns.len() || location >= columns.len() || timestamp == location {
            return None;
        }
        Some(Schema {
            columns,
            timestamp,
            location,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn timestamp_index(&self) -> usize {
        self.timestamp
    }

    pub fn location_index(&self) -> usize {
        self.location
    }

    pub fn timestamp_column(&self) -> &str {
        &self.columns[self.timestamp].name
    }

    pub fn location_column(&self) -> &str {
        &self.columns[self.location].name
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Names of the numeric measurement columns, in schema order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Row / Table
// ---------------------------------------------------------------------------

/// One observation. `cells` is aligned with the owning table's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Row { cells }
    }

    pub fn get(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&CellValue::Missing)
    }
}

/// An ordered, immutable sequence of rows sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Table { schema, rows }
    }

    /// A table with the same schema and the given rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Self {
        Table {
            schema: Arc::clone(&self.schema),
            rows,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamp(&self, row: &Row) -> Option<NaiveDateTime> {
        row.get(self.schema.timestamp).as_timestamp()
    }

    pub fn location<'a>(&self, row: &'a Row) -> Option<&'a str> {
        row.get(self.schema.location).as_text()
    }

    /// Numeric values of `column`, one entry per row (`None` when missing).
    pub fn numeric_column(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.schema.index_of(column)?;
        if self.schema.columns[idx].kind != ColumnKind::Numeric {
            return None;
        }
        Some(self.rows.iter().map(|r| r.get(idx).as_f64()).collect())
    }

    /// Distinct non-missing locations, sorted.
    pub fn locations(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().filter_map(|r| self.location(r)).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Earliest and latest timestamp, ignoring missing ones.
    pub fn time_extent(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut stamps = self.rows.iter().filter_map(|r| self.timestamp(r));
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }
}

// ---------------------------------------------------------------------------
// Dataset – a named table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub table: Table,
}

impl Dataset {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Dataset {
            name: name.into(),
            table,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
