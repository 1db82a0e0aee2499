use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::{CellValue, Table};

/// Count, mean and sample standard deviation of one column within one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub mean: Option<f64>,
    /// `n - 1` denominator; `None` below two observations.
    pub std_dev: Option<f64>,
}

impl GroupStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return GroupStats {
                count,
                mean: None,
                std_dev: None,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = (count >= 2).then(|| {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });
        GroupStats {
            count,
            mean: Some(mean),
            std_dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    /// Aligned with [`DistributionSummary::columns`].
    pub stats: Vec<GroupStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub group_column: String,
    pub columns: Vec<String>,
    /// Sorted by group name.
    pub groups: Vec<GroupSummary>,
}

impl DistributionSummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() || self.columns.is_empty()
    }
}

/// Per-location summary of `columns`.
pub fn summarize_by_location(table: &Table, columns: &[&str]) -> DistributionSummary {
    let location = table.schema().location_column().to_string();
    summarize_by(table, &location, columns).unwrap_or(DistributionSummary {
        group_column: location,
        columns: Vec::new(),
        groups: Vec::new(),
    })
}

/// Summary of `columns` grouped by the values of `group_column`. Rows with a
/// missing group are skipped. `None` when `group_column` does not exist.
pub fn summarize_by(table: &Table, group_column: &str, columns: &[&str]) -> Option<DistributionSummary> {
    let group_idx = table.schema().index_of(group_column)?;
    let data: Vec<(String, Vec<Option<f64>>)> = columns
        .iter()
        .filter_map(|&c| table.numeric_column(c).map(|v| (c.to_string(), v)))
        .collect();

    let mut grouped: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        let key = match row.get(group_idx) {
            CellValue::Missing => continue,
            CellValue::Text(s) => s.clone(),
            other => other.to_string(),
        };
        let buckets = grouped
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); data.len()]);
        for (bucket, (_, values)) in buckets.iter_mut().zip(&data) {
            if let Some(v) = values[row_idx] {
                bucket.push(v);
            }
        }
    }

    let groups = grouped
        .into_iter()
        .map(|(group, per_column)| GroupSummary {
            group,
            stats: per_column.iter().map(|v| GroupStats::from_values(v)).collect(),
        })
        .collect();

    Some(DistributionSummary {
        group_column: group_column.to_string(),
        columns: data.into_iter().map(|(c, _)| c).collect(),
        groups,
    })
}
