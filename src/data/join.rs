use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::model::{CellValue, Column, ColumnKind, Row, Schema, Table};

// ---------------------------------------------------------------------------
// Concatenation
// ---------------------------------------------------------------------------

/// Append the rows of every table, aligning columns by name.
///
/// The first table fixes the timestamp and location columns; the role
/// columns of later tables map onto them whatever their header spelling.
/// Columns absent from a table are filled with `Missing`. A column whose kind
/// disagrees between tables becomes categorical. Returns `None` for no input.
pub fn concat(tables: &[Table]) -> Option<Table> {
    let first = tables.first()?;
    let ts = first.schema().timestamp_index();
    let loc = first.schema().location_index();
    let mut columns: Vec<Column> = first.schema().columns().to_vec();

    let mut mappings: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
    for table in tables {
        let schema = table.schema();
        let mut mapping = Vec::with_capacity(schema.len());
        for (i, column) in schema.columns().iter().enumerate() {
            let target = if i == schema.timestamp_index() {
                ts
            } else if i == schema.location_index() {
                loc
            } else if let Some(j) = columns
                .iter()
                .enumerate()
                .position(|(j, c)| j != ts && j != loc && c.name == column.name)
            {
                if columns[j].kind != column.kind {
                    columns[j].kind = ColumnKind::Categorical;
                }
                j
            } else {
                columns.push(column.clone());
                columns.len() - 1
            };
            mapping.push(target);
        }
        mappings.push(mapping);
    }

    let total: usize = tables.iter().map(Table::len).sum();
    let mut rows = Vec::with_capacity(total);
    for (table, mapping) in tables.iter().zip(&mappings) {
        for row in table.rows() {
            let mut cells = vec![CellValue::Missing; columns.len()];
            for (cell, &target) in row.cells.iter().zip(mapping) {
                cells[target] = coerce(cell, columns[target].kind);
            }
            rows.push(Row::new(cells));
        }
    }

    let schema = Schema::new(columns, ts, loc)?;
    Some(Table::new(Arc::new(schema), rows))
}

fn coerce(cell: &CellValue, kind: ColumnKind) -> CellValue {
    match (cell, kind) {
        (CellValue::Number(_), ColumnKind::Categorical) => CellValue::Text(cell.to_string()),
        _ => cell.clone(),
    }
}

// ---------------------------------------------------------------------------
// Inner join on (timestamp, location)
// ---------------------------------------------------------------------------

/// Inner join of two tables on timestamp and exact location.
///
/// Output rows follow the left table's order; a left row matching several
/// right rows is repeated once per match, in right-table order. Rows missing
/// either key never match. Non-key columns present on both sides are renamed
/// with `_x` (left) and `_y` (right) suffixes.
pub fn inner_join(left: &Table, right: &Table) -> Table {
    let ls = left.schema();
    let rs = right.schema();
    let left_keys: Vec<usize> = vec![ls.timestamp_index(), ls.location_index()];
    let right_keys: Vec<usize> = vec![rs.timestamp_index(), rs.location_index()];

    let left_names: Vec<&str> = ls
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| !left_keys.contains(i))
        .map(|(_, c)| c.name.as_str())
        .collect();
    let right_extra: Vec<usize> = (0..rs.len()).filter(|i| !right_keys.contains(i)).collect();
    let right_names: Vec<&str> = right_extra
        .iter()
        .map(|&i| rs.columns()[i].name.as_str())
        .collect();

    let mut columns: Vec<Column> = ls
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if !left_keys.contains(&i) && right_names.contains(&c.name.as_str()) {
                Column::new(format!("{}_x", c.name), c.kind)
            } else {
                c.clone()
            }
        })
        .collect();
    for &i in &right_extra {
        let c = &rs.columns()[i];
        let name = if left_names.contains(&c.name.as_str()) {
            format!("{}_y", c.name)
        } else {
            c.name.clone()
        };
        columns.push(Column::new(name, c.kind));
    }

    let mut index: HashMap<(NaiveDateTime, &str), Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let (Some(ts), Some(loc)) = (right.timestamp(row), right.location(row)) {
            index.entry((ts, loc)).or_default().push(i);
        }
    }

    let mut rows = Vec::new();
    for row in left.rows() {
        let (Some(ts), Some(loc)) = (left.timestamp(row), left.location(row)) else {
            continue;
        };
        let Some(matches) = index.get(&(ts, loc)) else {
            continue;
        };
        for &j in matches {
            let other = &right.rows()[j];
            let mut cells = row.cells.clone();
            cells.extend(right_extra.iter().map(|&k| other.get(k).clone()));
            rows.push(Row::new(cells));
        }
    }

    // Left columns keep their positions, so the left role indices still hold.
    match Schema::new(columns, ls.timestamp_index(), ls.location_index()) {
        Some(schema) => Table::new(Arc::new(schema), rows),
        None => left.with_rows(Vec::new()),
    }
}
