use serde::Serialize;

use crate::data::model::Table;

/// Pairwise Pearson correlations. `values[i][j]` pairs `columns[i]` with
/// `columns[j]`; `None` marks an undefined coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Correlation over every numeric column of `table`.
pub fn correlation_matrix(table: &Table) -> CorrelationMatrix {
    let columns = table.schema().numeric_columns();
    correlation_matrix_for(table, &columns)
}

/// Correlation over the given columns; absent or non-numeric ones are dropped.
pub fn correlation_matrix_for(table: &Table, columns: &[&str]) -> CorrelationMatrix {
    let data: Vec<(String, Vec<Option<f64>>)> = columns
        .iter()
        .filter_map(|&c| table.numeric_column(c).map(|v| (c.to_string(), v)))
        .collect();

    let n = data.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&data[i].1, &data[j].1);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        columns: data.into_iter().map(|(c, _)| c).collect(),
        values,
    }
}

/// Pearson's r over rows where both values are present. Undefined with fewer
/// than two such rows or when either side is constant across them.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|&(x, _)| x == x0) || pairs.iter().all(|&(_, y)| y == y0) {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Column, ColumnKind, Row, Schema};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn numeric_table(columns: &[&str], rows: &[&[Option<f64>]]) -> Table {
        let mut cols = vec![
            Column::new("Date", ColumnKind::Timestamp),
            Column::new("City", ColumnKind::Categorical),
        ];
        cols.extend(columns.iter().map(|c| Column::new(*c, ColumnKind::Numeric)));
        let schema = Schema::new(cols, 0, 1).unwrap();
        let rows = rows
            .iter()
            .map(|vals| {
                let mut cells = vec![CellValue::Missing, CellValue::Text("A".into())];
                cells.extend(vals.iter().map(|v| v.map_or(CellValue::Missing, CellValue::Number)));
                Row::new(cells)
            })
            .collect();
        Table::new(Arc::new(schema), rows)
    }

    #[test]
    fn perfect_and_inverse_correlation() {
        let t = numeric_table(
            &["a", "b", "c"],
            &[
                &[Some(1.0), Some(2.0), Some(9.0)],
                &[Some(2.0), Some(4.0), Some(6.0)],
                &[Some(3.0), Some(6.0), Some(3.0)],
            ],
        );
        let m = correlation_matrix(&t);
        assert_eq!(m.columns, vec!["a", "b", "c"]);
        assert_relative_eq!(m.get("a", "b").unwrap(), 1.0);
        assert_relative_eq!(m.get("a", "c").unwrap(), -1.0);
        assert_relative_eq!(m.get("c", "c").unwrap(), 1.0);
    }

    #[test]
    fn zero_variance_column_is_undefined_everywhere() {
        let t = numeric_table(
            &["a", "flat"],
            &[&[Some(1.0), Some(0.1)], &[Some(2.0), Some(0.1)], &[Some(5.0), Some(0.1)]],
        );
        let m = correlation_matrix(&t);
        assert_eq!(m.get("a", "flat"), None);
        assert_eq!(m.get("flat", "a"), None);
        assert_eq!(m.get("flat", "flat"), None);
        assert_relative_eq!(m.get("a", "a").unwrap(), 1.0);
    }

    #[test]
    fn uses_pairwise_complete_rows() {
        let xs = [Some(1.0), Some(2.0), None, Some(3.0), Some(100.0)];
        let ys = [Some(1.0), Some(2.0), Some(50.0), Some(3.0), None];
        assert_relative_eq!(pearson(&xs, &ys).unwrap(), 1.0);
        assert_eq!(pearson(&[Some(1.0)], &[Some(2.0)]), None);
    }

    #[test]
    fn matrix_is_symmetric() {
        let t = numeric_table(
            &["a", "b", "c"],
            &[
                &[Some(1.0), Some(7.5), None],
                &[Some(2.3), Some(1.0), Some(4.0)],
                &[Some(0.4), Some(3.2), Some(1.0)],
                &[Some(8.0), None, Some(2.2)],
                &[Some(5.5), Some(2.0), Some(9.1)],
            ],
        );
        let m = correlation_matrix(&t);
        for a in &m.columns {
            for b in &m.columns {
                assert_eq!(m.get(a, b), m.get(b, a));
            }
        }
    }
}
