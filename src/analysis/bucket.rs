use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Time buckets
// ---------------------------------------------------------------------------

/// Calendar interval used to group observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Day,
    /// ISO week, starting Monday.
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 5] = [
        TimeBucket::Day,
        TimeBucket::Week,
        TimeBucket::Month,
        TimeBucket::Quarter,
        TimeBucket::Year,
    ];

    /// First day of the bucket containing `ts`.
    pub fn start_of(&self, ts: NaiveDateTime) -> NaiveDate {
        let date = ts.date();
        match self {
            TimeBucket::Day => date,
            TimeBucket::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            TimeBucket::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
            TimeBucket::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            TimeBucket::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeBucket::Day => "Day",
            TimeBucket::Week => "Week",
            TimeBucket::Month => "Month",
            TimeBucket::Quarter => "Quarter",
            TimeBucket::Year => "Year",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Bucketed aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketPoint {
    pub bucket: NaiveDate,
    pub value: f64,
    /// Non-missing observations that went into `value`.
    pub count: usize,
}

/// One aggregate per bucket for a single column, in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketedSeries {
    pub column: String,
    pub points: Vec<BucketPoint>,
}

/// Non-missing values of `column` grouped by bucket. Rows without a
/// timestamp are skipped; buckets only exist once they receive a value.
fn group_values(table: &Table, bucket: TimeBucket, column: &str) -> Option<BTreeMap<NaiveDate, Vec<f64>>> {
    let values = table.numeric_column(column)?;
    let mut groups: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (row, value) in table.rows().iter().zip(values) {
        if let (Some(ts), Some(v)) = (table.timestamp(row), value) {
            groups.entry(bucket.start_of(ts)).or_default().push(v);
        }
    }
    Some(groups)
}

/// Mean of each requested numeric column per bucket. Columns that are absent
/// or not numeric are skipped; buckets with no values are omitted.
pub fn bucketed_means(table: &Table, bucket: TimeBucket, columns: &[&str]) -> Vec<BucketedSeries> {
    columns
        .iter()
        .filter_map(|&column| {
            let groups = group_values(table, bucket, column)?;
            let points = groups
                .into_iter()
                .map(|(b, vals)| BucketPoint {
                    bucket: b,
                    value: vals.iter().sum::<f64>() / vals.len() as f64,
                    count: vals.len(),
                })
                .collect();
            Some(BucketedSeries {
                column: column.to_string(),
                points,
            })
        })
        .collect()
}

/// The `q`-quantile (`0.0..=1.0`) of `column` per bucket.
pub fn bucketed_percentile(table: &Table, bucket: TimeBucket, column: &str, q: f64) -> Option<BucketedSeries> {
    let groups = group_values(table, bucket, column)?;
    let points = groups
        .into_iter()
        .filter_map(|(b, mut vals)| {
            let count = vals.len();
            percentile(&mut vals, q).map(|value| BucketPoint {
                bucket: b,
                value,
                count,
            })
        })
        .collect();
    Some(BucketedSeries {
        column: column.to_string(),
        points,
    })
}

/// Spread daily points over every calendar day from the first to the last,
/// linearly interpolating the days in between that had no value.
///
/// `points` must be daily buckets in chronological order, as produced by
/// [`bucketed_means`] with [`TimeBucket::Day`]. The result is evenly spaced
/// and can be fed to a decomposition that assigns phases by position.
pub fn interpolate_daily(points: &[BucketPoint]) -> (Vec<NaiveDate>, Vec<f64>) {
    let Some((first, rest)) = points.split_first() else {
        return (Vec::new(), Vec::new());
    };
    let mut dates = vec![first.bucket];
    let mut values = vec![first.value];
    let mut prev = first;
    for next in rest {
        let gap = (next.bucket - prev.bucket).num_days();
        for k in 1..gap {
            let frac = k as f64 / gap as f64;
            dates.push(prev.bucket + Duration::days(k));
            values.push(prev.value + (next.value - prev.value) * frac);
        }
        dates.push(next.bucket);
        values.push(next.value);
        prev = next;
    }
    (dates, values)
}

/// Linear-interpolated quantile; sorts `values` in place. `q` is clamped.
pub fn percentile(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(values[lo] + (values[hi] - values[lo]) * (pos - lo as f64))
}
