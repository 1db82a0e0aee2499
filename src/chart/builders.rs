use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{
    date_days_since_epoch, days_since_epoch, Axis, Bar, ChartBody, ChartSpec, Heatmap, MarkStyle,
    Series,
};
use crate::analysis::bucket::{BucketedSeries, TimeBucket};
use crate::analysis::correlation::CorrelationMatrix;
use crate::analysis::decompose::Decomposition;
use crate::analysis::distribution::DistributionSummary;
use crate::color::{diverging, ColorMap, Rgb};
use crate::data::model::{Row, Table};

/// Label used for rows whose location is missing.
const UNKNOWN_LOCATION: &str = "NA";

// ---------------------------------------------------------------------------
// Per-location point series
// ---------------------------------------------------------------------------

/// Split `(x, y)` points by location, in first-seen row order within each
/// location. Rows where either coordinate is missing produce no point.
fn points_by_location(
    table: &Table,
    mut point: impl FnMut(&Row) -> Option<[f64; 2]>,
) -> BTreeMap<String, Vec<[f64; 2]>> {
    let mut groups: BTreeMap<String, Vec<[f64; 2]>> = BTreeMap::new();
    for row in table.rows() {
        if let Some(p) = point(row) {
            let loc = table.location(row).unwrap_or(UNKNOWN_LOCATION);
            groups.entry(loc.to_string()).or_default().push(p);
        }
    }
    groups
}

fn colored_series(groups: BTreeMap<String, Vec<[f64; 2]>>, style: MarkStyle) -> Vec<Series> {
    let colors = ColorMap::new(groups.keys().cloned());
    groups
        .into_iter()
        .map(|(name, points)| Series {
            color: colors.color_for(&name),
            name,
            style,
            points,
        })
        .collect()
}

/// Line per location of `column` over time.
pub fn time_series(table: &Table, column: &str) -> ChartSpec {
    let title = format!("{column} Levels Over Time");
    let Some(values) = table.numeric_column(column) else {
        return ChartSpec::no_data(title, format!("Column '{column}' is not numeric"));
    };
    let mut values = values.into_iter();
    let mut groups = points_by_location(table, |row| {
        let v = values.next().flatten()?;
        Some([days_since_epoch(table.timestamp(row)?), v])
    });
    if groups.is_empty() {
        return ChartSpec::no_data(title, format!("No {column} values in the selection"));
    }
    for points in groups.values_mut() {
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
    }
    ChartSpec::new(
        title,
        Axis::days("Date"),
        Axis::numeric(format!("{column} Concentration")),
        ChartBody::Series(colored_series(groups, MarkStyle::Line)),
    )
}

/// `y_column` against `x_column`, one point series per location.
pub fn scatter(table: &Table, x_column: &str, y_column: &str) -> ChartSpec {
    let title = format!("{y_column} vs {x_column}");
    let (Some(xs), Some(ys)) = (table.numeric_column(x_column), table.numeric_column(y_column)) else {
        return ChartSpec::no_data(title, "Both axes need numeric columns");
    };
    let mut pairs = xs.into_iter().zip(ys);
    let groups = points_by_location(table, |_| match pairs.next()? {
        (Some(x), Some(y)) => Some([x, y]),
        _ => None,
    });
    if groups.is_empty() {
        return ChartSpec::no_data(title, format!("No rows with both {x_column} and {y_column}"));
    }
    ChartSpec::new(
        title,
        Axis::numeric(x_column),
        Axis::numeric(y_column),
        ChartBody::Series(colored_series(groups, MarkStyle::Points)),
    )
}

// ---------------------------------------------------------------------------
// Correlation heatmap
// ---------------------------------------------------------------------------

pub fn correlation_heatmap(matrix: &CorrelationMatrix) -> ChartSpec {
    let title = "Correlation Matrix";
    if matrix.is_empty() {
        return ChartSpec::no_data(title, "No numeric columns to correlate");
    }
    let colors = matrix
        .values
        .iter()
        .map(|row| row.iter().map(|v| v.map_or(Rgb::GRAY, diverging)).collect())
        .collect();
    let labels = matrix.columns.clone();
    ChartSpec::new(
        title,
        Axis::categories("", labels.clone()),
        Axis::categories("", labels.clone()),
        ChartBody::Heatmap(Heatmap {
            labels,
            values: matrix.values.clone(),
            colors,
        }),
    )
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Bar per group of the mean of `column`, whiskers at ±1 standard deviation.
pub fn distribution(summary: &DistributionSummary, column: &str) -> ChartSpec {
    let title = format!("{column} by {}", summary.group_column);
    let Some(col_idx) = summary.columns.iter().position(|c| c == column) else {
        return ChartSpec::no_data(title, format!("Column '{column}' is not numeric"));
    };

    let colors = ColorMap::new(summary.groups.iter().map(|g| g.group.clone()));
    let present: Vec<(&str, f64, Option<f64>)> = summary
        .groups
        .iter()
        .filter_map(|g| {
            let stats = &g.stats[col_idx];
            Some((g.group.as_str(), stats.mean?, stats.std_dev))
        })
        .collect();
    if present.is_empty() {
        return ChartSpec::no_data(title, format!("No {column} values in the selection"));
    }

    let bars = present
        .iter()
        .enumerate()
        .map(|(index, &(group, mean, std_dev))| Bar {
            index,
            label: group.to_string(),
            value: mean,
            whisker: std_dev,
            color: colors.color_for(group),
        })
        .collect();
    let labels = present.iter().map(|(g, _, _)| g.to_string()).collect();
    ChartSpec::new(
        title,
        Axis::categories(summary.group_column.clone(), labels),
        Axis::numeric(format!("Mean {column} (±1 sd)")),
        ChartBody::Bars(bars),
    )
}

// ---------------------------------------------------------------------------
// Seasonal trend
// ---------------------------------------------------------------------------

/// Decomposition of a series observed on `dates` (one date per value).
#[derive(Debug, Clone, Copy)]
pub struct DatedDecomposition<'a> {
    pub dates: &'a [NaiveDate],
    pub decomposition: &'a Decomposition,
}

fn dated_points(dates: &[NaiveDate], values: impl Iterator<Item = Option<f64>>) -> Vec<[f64; 2]> {
    dates
        .iter()
        .zip(values)
        .filter_map(|(d, v)| Some([date_days_since_epoch(*d), v?]))
        .collect()
}

fn bucket_points(series: &BucketedSeries) -> Vec<[f64; 2]> {
    series
        .points
        .iter()
        .map(|p| [date_days_since_epoch(p.bucket), p.value])
        .collect()
}

/// Bucketed mean (plus an optional upper-percentile line) followed, when
/// available, by trend, seasonal and residual panels.
pub fn seasonal_trend(
    means: &BucketedSeries,
    upper: Option<(&str, &BucketedSeries)>,
    bucket: TimeBucket,
    decomposition: Option<DatedDecomposition<'_>>,
) -> ChartSpec {
    let column = &means.column;
    let title = format!("{column} by {bucket}");
    if means.points.is_empty() {
        return ChartSpec::no_data(title, format!("No {column} values in the selection"));
    }

    let mut series = vec![Series {
        name: format!("{bucket} mean"),
        color: Rgb::STEEL_BLUE,
        style: MarkStyle::Line,
        points: bucket_points(means),
    }];
    if let Some((label, upper)) = upper {
        series.push(Series {
            name: label.to_string(),
            color: diverging(0.8),
            style: MarkStyle::DashedLine,
            points: bucket_points(upper),
        });
    }
    let overview = ChartSpec::new(
        title.clone(),
        Axis::days("Date"),
        Axis::numeric(column.clone()),
        ChartBody::Series(series),
    );

    let Some(DatedDecomposition { dates, decomposition: d }) = decomposition else {
        return overview;
    };
    let panel = |name: &str, points: Vec<[f64; 2]>| {
        ChartSpec::new(
            name,
            Axis::days("Date"),
            Axis::numeric(name),
            ChartBody::Series(vec![Series {
                name: name.to_string(),
                color: Rgb::STEEL_BLUE,
                style: MarkStyle::Line,
                points,
            }]),
        )
    };
    let panels = vec![
        overview,
        panel("Trend", dated_points(dates, d.trend.iter().copied())),
        panel("Seasonality", dated_points(dates, d.seasonal.iter().map(|v| Some(*v)))),
        panel("Residuals", dated_points(dates, d.residual.iter().copied())),
    ];
    ChartSpec::new(
        title,
        Axis::days("Date"),
        Axis::numeric(column.clone()),
        ChartBody::Panels(panels),
    )
    .with_note(format!("Additive decomposition, period {}", d.period))
}
