//! Chart descriptions: toolkit-independent accounts of what to draw.
//!
//! Builders in [`builders`] turn already filtered and aggregated data into a
//! [`ChartSpec`]. They never filter or aggregate themselves, so any front end
//! that can draw a `ChartSpec` reuses the data and analysis layers unchanged.

pub mod builders;

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::analysis::bucket::TimeBucket;
use crate::color::Rgb;

// ---------------------------------------------------------------------------
// Chart kinds and requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    #[default]
    TimeSeries,
    Scatter,
    CorrelationHeatmap,
    Distribution,
    SeasonalTrend,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::TimeSeries,
        ChartKind::Scatter,
        ChartKind::CorrelationHeatmap,
        ChartKind::Distribution,
        ChartKind::SeasonalTrend,
    ];

    /// Whether the chart plots a second measurement column.
    pub fn uses_secondary(&self) -> bool {
        matches!(self, ChartKind::Scatter)
    }

    /// Whether the chart groups observations by time bucket.
    pub fn uses_bucket(&self) -> bool {
        matches!(self, ChartKind::SeasonalTrend)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChartKind::TimeSeries => "Time series",
            ChartKind::Scatter => "Weather impact (scatter)",
            ChartKind::CorrelationHeatmap => "Correlation heatmap",
            ChartKind::Distribution => "Distribution by city",
            ChartKind::SeasonalTrend => "Seasonal trend",
        };
        f.write_str(label)
    }
}

/// What to draw, rebuilt on every interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    /// Main measurement column (pollutant).
    pub primary: Option<String>,
    /// Second measurement column for scatter plots (weather factor).
    pub secondary: Option<String>,
    pub bucket: TimeBucket,
}

// ---------------------------------------------------------------------------
// ChartSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AxisScale {
    Numeric,
    /// Values are days since 1970-01-01 (fractional for times of day).
    Days,
    /// Integer positions index into the label list.
    Categories(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    pub scale: AxisScale,
}

impl Axis {
    pub fn numeric(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            scale: AxisScale::Numeric,
        }
    }

    pub fn days(label: impl Into<String>) -> Self {
        Axis {
            label: label.into(),
            scale: AxisScale::Days,
        }
    }

    pub fn categories(label: impl Into<String>, labels: Vec<String>) -> Self {
        Axis {
            label: label.into(),
            scale: AxisScale::Categories(labels),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkStyle {
    Line,
    DashedLine,
    Points,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: Rgb,
    pub style: MarkStyle,
    pub points: Vec<[f64; 2]>,
}

/// One bar at category position `index`, with an optional symmetric whisker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub index: usize,
    pub label: String,
    pub value: f64,
    pub whisker: Option<f64>,
    pub color: Rgb,
}

/// Square matrix of annotated cells; `values[row][col]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    pub colors: Vec<Vec<Rgb>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChartBody {
    Series(Vec<Series>),
    Bars(Vec<Bar>),
    Heatmap(Heatmap),
    /// Stacked sub-charts sharing the width of the plot area.
    Panels(Vec<ChartSpec>),
    NoData { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub body: ChartBody,
    /// Secondary remark shown under the title.
    pub note: Option<String>,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, x_axis: Axis, y_axis: Axis, body: ChartBody) -> Self {
        ChartSpec {
            title: title.into(),
            x_axis,
            y_axis,
            body,
            note: None,
        }
    }

    /// Placeholder chart for an empty selection.
    pub fn no_data(title: impl Into<String>, message: impl Into<String>) -> Self {
        ChartSpec::new(
            title,
            Axis::numeric(""),
            Axis::numeric(""),
            ChartBody::NoData {
                message: message.into(),
            },
        )
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.body, ChartBody::NoData { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Time axis helpers
// ---------------------------------------------------------------------------

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn days_since_epoch(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

pub fn date_days_since_epoch(date: NaiveDate) -> f64 {
    days_since_epoch(date.and_time(NaiveTime::MIN))
}

/// Inverse of [`days_since_epoch`], truncated to the calendar date.
pub fn date_from_days(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    let seconds = (days * SECONDS_PER_DAY).floor() as i64;
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_axis_round_trip() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let days = date_days_since_epoch(date);
        assert_eq!(days, 19_359.0);
        assert_eq!(date_from_days(days + 0.75), Some(date));
        assert_eq!(date_from_days(f64::NAN), None);
    }

    #[test]
    fn no_data_serializes() {
        let spec = ChartSpec::no_data("PM2.5", "No data for the selected filters");
        assert!(spec.is_no_data());
        let json = spec.to_json().unwrap();
        assert!(json.contains("NoData"));
        assert!(json.contains("No data for the selected filters"));
    }
}
