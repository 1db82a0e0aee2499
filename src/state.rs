use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::analysis::bucket::{bucketed_means, bucketed_percentile, interpolate_daily, TimeBucket};
use crate::analysis::correlation::correlation_matrix;
use crate::analysis::decompose::seasonal_decompose;
use crate::analysis::distribution::summarize_by_location;
use crate::chart::builders::{self, DatedDecomposition};
use crate::chart::{ChartKind, ChartRequest, ChartSpec};
use crate::config::DashboardConfig;
use crate::data::filter::{apply, DateRange, EmptyReason, FilterSpec};
use crate::data::model::{Dataset, Table};
use crate::data::registry::DatasetRegistry;
use crate::error::Result;

/// Quantile drawn above the bucketed mean on the seasonal chart.
const UPPER_QUANTILE: f64 = 0.9;

// ---------------------------------------------------------------------------
// Interactions and selection
// ---------------------------------------------------------------------------

/// One user action. Every variant triggers exactly one synchronous render.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    SelectDataset(String),
    SetDateRange { start: NaiveDate, end: NaiveDate },
    /// `None` means all cities.
    SetCity(Option<String>),
    SetChartKind(ChartKind),
    SetPrimaryColumn(String),
    SetSecondaryColumn(String),
    SetBucket(TimeBucket),
    ShowRawData(bool),
    /// Forget a dataset's load failure and select it again.
    RetryDataset(String),
}

/// Current values of every control.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub dataset: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub city: Option<String>,
    pub chart: ChartKind,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub bucket: TimeBucket,
    pub show_raw: bool,
}

impl Selection {
    pub fn filter_spec(&self) -> FilterSpec {
        let range = match (self.start, self.end) {
            (Some(start), Some(end)) => Some(DateRange::from_dates(start, end)),
            _ => None,
        };
        FilterSpec::new(range, self.city.clone())
    }

    pub fn chart_request(&self) -> ChartRequest {
        ChartRequest {
            kind: self.chart,
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            bucket: self.bucket,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendered view
// ---------------------------------------------------------------------------

/// Output of one render: the chart plus the rows it was built from.
#[derive(Debug, Clone)]
pub struct View {
    pub chart: ChartSpec,
    pub filtered: Table,
    /// Set when the filter matched nothing.
    pub empty: Option<EmptyReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rendering,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Per-session dashboard state, independent of rendering.
///
/// Each [`handle`](Self::handle) call moves Idle → Rendering → Idle before
/// returning. Errors never escape: they become [`status_message`](Self::status_message)
/// and the previous view stays on screen.
pub struct DashboardController {
    registry: Arc<DatasetRegistry>,
    config: DashboardConfig,
    phase: Phase,
    selection: Selection,
    dataset: Option<Arc<Dataset>>,
    cities: Vec<String>,
    view: Option<View>,
    status_message: Option<String>,
    /// Last dataset whose selection failed with a recorded load failure.
    failed: Option<String>,
    renders: u64,
}

impl DashboardController {
    pub fn new(registry: Arc<DatasetRegistry>, config: DashboardConfig) -> Self {
        let selection = Selection {
            bucket: config.default_bucket,
            ..Selection::default()
        };
        DashboardController {
            registry,
            config,
            phase: Phase::Idle,
            selection,
            dataset: None,
            cities: Vec::new(),
            view: None,
            status_message: None,
            failed: None,
            renders: 0,
        }
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    /// Distinct locations of the current dataset, sorted.
    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Name of the dataset the user last tried to open and that failed to
    /// load, while it is still marked unavailable.
    pub fn failed_dataset(&self) -> Option<&str> {
        self.failed.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Number of completed renders.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Numeric columns of the current dataset: configured pollutants first,
    /// then every other numeric column.
    pub fn pollutant_columns(&self) -> Vec<String> {
        self.ordered_columns(&self.config.pollutants)
    }

    /// Numeric columns of the current dataset: configured weather factors
    /// first, then every other numeric column.
    pub fn weather_columns(&self) -> Vec<String> {
        self.ordered_columns(&self.config.weather_factors)
    }

    fn ordered_columns(&self, preferred: &[String]) -> Vec<String> {
        let Some(ds) = &self.dataset else {
            return Vec::new();
        };
        let numeric = ds.table.schema().numeric_columns();
        let mut out: Vec<String> = preferred
            .iter()
            .filter(|p| numeric.contains(&p.as_str()))
            .cloned()
            .collect();
        out.extend(
            numeric
                .iter()
                .filter(|n| !preferred.iter().any(|p| p == *n))
                .map(|n| n.to_string()),
        );
        out
    }

    /// Apply one interaction and re-render synchronously.
    pub fn handle(&mut self, interaction: Interaction) {
        self.phase = Phase::Rendering;
        if let Err(e) = self.apply_interaction(interaction).and_then(|_| self.render()) {
            warn!("{e}");
            self.status_message = Some(e.to_string());
        }
        self.phase = Phase::Idle;
    }

    fn apply_interaction(&mut self, interaction: Interaction) -> Result<()> {
        debug!("Interaction: {interaction:?}");
        match interaction {
            Interaction::SelectDataset(name) => self.select_dataset(&name)?,
            Interaction::SetDateRange { start, end } => {
                self.selection.start = Some(start);
                self.selection.end = Some(end);
            }
            Interaction::SetCity(city) => self.selection.city = city,
            Interaction::SetChartKind(kind) => self.selection.chart = kind,
            Interaction::SetPrimaryColumn(col) => self.selection.primary = Some(col),
            Interaction::SetSecondaryColumn(col) => self.selection.secondary = Some(col),
            Interaction::SetBucket(bucket) => self.selection.bucket = bucket,
            Interaction::ShowRawData(show) => self.selection.show_raw = show,
            Interaction::RetryDataset(name) => {
                info!("Retrying dataset '{name}'");
                self.registry.retry(&name);
                self.select_dataset(&name)?;
            }
        }
        Ok(())
    }

    /// Load `name` and reset the filters to its full extent. On failure the
    /// previous dataset and selection are left untouched.
    fn select_dataset(&mut self, name: &str) -> Result<()> {
        let dataset = match self.registry.get(name) {
            Ok(dataset) => dataset,
            Err(e) => {
                if self.registry.failure(name).is_some() {
                    self.failed = Some(name.to_string());
                }
                return Err(e);
            }
        };
        self.failed = None;
        let extent = dataset.table.time_extent();
        info!("Selected dataset '{name}' ({} rows)", dataset.len());

        self.cities = dataset.table.locations();
        self.selection.dataset = Some(name.to_string());
        self.selection.start = extent.map(|(lo, _)| lo.date());
        self.selection.end = extent.map(|(_, hi)| hi.date());
        self.selection.city = None;
        self.dataset = Some(dataset);

        let pollutants = self.pollutant_columns();
        let weather = self.weather_columns();
        self.selection.primary = pollutants.first().cloned();
        self.selection.secondary = weather
            .iter()
            .find(|c| Some(*c) != self.selection.primary.as_ref())
            .cloned()
            .or_else(|| self.selection.primary.clone());
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let Some(dataset) = self.dataset.clone() else {
            return Ok(());
        };
        let started = Instant::now();
        let filter = self.selection.filter_spec();
        let filtered = apply(&dataset.table, &filter);
        let empty = filter.empty_reason(&filtered);
        let request = self.selection.chart_request();
        let chart = match empty {
            Some(reason) => ChartSpec::no_data(request.kind.to_string(), reason.message()),
            None => self.build_chart(&filtered, &request),
        };
        debug!(
            "Rendered {:?} from {} of {} rows in {:?}",
            request.kind,
            filtered.len(),
            dataset.len(),
            started.elapsed()
        );

        self.view = Some(View {
            chart,
            filtered,
            empty,
        });
        self.status_message = None;
        self.renders += 1;
        Ok(())
    }

    /// Shape `filtered` for the requested chart kind and hand it to the builder.
    fn build_chart(&self, filtered: &Table, request: &ChartRequest) -> ChartSpec {
        let Some(primary) = request.primary.as_deref() else {
            return match request.kind {
                ChartKind::CorrelationHeatmap => {
                    builders::correlation_heatmap(&correlation_matrix(filtered))
                }
                kind => ChartSpec::no_data(kind.to_string(), "The dataset has no numeric columns"),
            };
        };
        match request.kind {
            ChartKind::TimeSeries => builders::time_series(filtered, primary),
            ChartKind::Scatter => {
                let secondary = request.secondary.as_deref().unwrap_or(primary);
                builders::scatter(filtered, secondary, primary)
            }
            ChartKind::CorrelationHeatmap => {
                builders::correlation_heatmap(&correlation_matrix(filtered))
            }
            ChartKind::Distribution => {
                builders::distribution(&summarize_by_location(filtered, &[primary]), primary)
            }
            ChartKind::SeasonalTrend => self.seasonal_chart(filtered, primary, request.bucket),
        }
    }

    fn seasonal_chart(&self, filtered: &Table, column: &str, bucket: TimeBucket) -> ChartSpec {
        let Some(means) = bucketed_means(filtered, bucket, &[column]).into_iter().next() else {
            return ChartSpec::no_data(
                ChartKind::SeasonalTrend.to_string(),
                format!("Column '{column}' is not numeric"),
            );
        };
        let upper = bucketed_percentile(filtered, bucket, column, UPPER_QUANTILE);
        let upper_label = format!("{:.0}th percentile", UPPER_QUANTILE * 100.0);
        let upper = upper.as_ref().map(|u| (upper_label.as_str(), u));

        // Decomposition runs on the daily mean across the selected cities,
        // with days lacking any value interpolated so phases stay aligned.
        let daily = bucketed_means(filtered, TimeBucket::Day, &[column]);
        let observed_days = daily.first().map_or(0, |s| s.points.len());
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = daily
            .first()
            .map(|s| interpolate_daily(&s.points))
            .unwrap_or_default();
        if dates.len() > observed_days {
            debug!(
                "Interpolated {} missing days of '{column}' before decomposition",
                dates.len() - observed_days
            );
        }

        match seasonal_decompose(&values, self.config.seasonal_period) {
            Ok(decomposition) => builders::seasonal_trend(
                &means,
                upper,
                bucket,
                Some(DatedDecomposition {
                    dates: &dates,
                    decomposition: &decomposition,
                }),
            ),
            Err(e) => {
                debug!("Skipping decomposition: {e}");
                let chart = builders::seasonal_trend(&means, upper, bucket, None);
                if chart.is_no_data() {
                    chart
                } else {
                    chart.with_note(format!("Seasonal decomposition unavailable: {e}"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartBody;
    use crate::data::loader::ColumnRoles;
    use crate::data::registry::DatasetSource;
    use approx::assert_relative_eq;
    use std::fs;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn controller(period: usize) -> (tempfile::TempDir, DashboardController) {
        let mut body = String::from("Date,City,PM2.5,Temperature\n");
        for day in 1..=28 {
            body.push_str(&format!("2023-02-{day:02},Denver,{},{}\n", day % 7, day));
            body.push_str(&format!("2023-02-{day:02},Boulder,{},\n", day % 5));
        }
        controller_with(&body, period)
    }

    /// Controller over a single dataset "aq" read from `body`.
    fn controller_with(body: &str, period: usize) -> (tempfile::TempDir, DashboardController) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aq.csv");
        fs::write(&path, body).unwrap();

        let registry = DatasetRegistry::new(ColumnRoles::default());
        registry.register("aq", DatasetSource::File(path));
        let config = DashboardConfig {
            seasonal_period: period,
            ..DashboardConfig::default()
        };
        (dir, DashboardController::new(Arc::new(registry), config))
    }

    #[test]
    fn selecting_dataset_resets_filters_and_renders() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.renders(), 1);
        let s = c.selection();
        assert_eq!(s.start, Some(date("2023-02-01")));
        assert_eq!(s.end, Some(date("2023-02-28")));
        assert_eq!(s.city, None);
        assert_eq!(s.primary.as_deref(), Some("PM2.5"));
        assert_eq!(s.secondary.as_deref(), Some("Temperature"));
        assert_eq!(c.cities(), ["Boulder", "Denver"]);

        let view = c.view().unwrap();
        assert_eq!(view.filtered.len(), 56);
        assert_eq!(view.empty, None);
        assert!(!view.chart.is_no_data());
    }

    #[test]
    fn city_filter_narrows_view() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        c.handle(Interaction::SetCity(Some("denver".into())));
        assert_eq!(c.view().unwrap().filtered.len(), 28);
    }

    #[test]
    fn inverted_range_renders_placeholder() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        c.handle(Interaction::SetDateRange {
            start: date("2023-02-20"),
            end: date("2023-02-10"),
        });
        let view = c.view().unwrap();
        assert_eq!(view.empty, Some(EmptyReason::InvalidRange));
        assert!(view.chart.is_no_data());
        assert_eq!(c.status_message(), None);
    }

    #[test]
    fn unknown_dataset_keeps_previous_view() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        c.handle(Interaction::SelectDataset("nonexistent".into()));
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.status_message().unwrap().contains("nonexistent"));
        assert_eq!(c.selection().dataset.as_deref(), Some("aq"));
        assert_eq!(c.view().unwrap().filtered.len(), 56);
        assert_eq!(c.renders(), 1);
    }

    #[test]
    fn every_chart_kind_renders() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        for kind in ChartKind::ALL {
            c.handle(Interaction::SetChartKind(kind));
            let chart = &c.view().unwrap().chart;
            assert!(!chart.is_no_data(), "{kind} rendered no data");
        }
    }

    #[test]
    fn seasonal_chart_includes_decomposition_when_long_enough() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        c.handle(Interaction::SetBucket(TimeBucket::Week));
        c.handle(Interaction::SetChartKind(ChartKind::SeasonalTrend));
        assert!(matches!(c.view().unwrap().chart.body, ChartBody::Panels(ref p) if p.len() == 4));

        let (_dir, mut short) = controller(365);
        short.handle(Interaction::SelectDataset("aq".into()));
        short.handle(Interaction::SetChartKind(ChartKind::SeasonalTrend));
        let chart = &short.view().unwrap().chart;
        assert!(matches!(chart.body, ChartBody::Series(_)));
        assert!(chart.note.as_deref().unwrap().contains("unavailable"));
    }

    #[test]
    fn seasonal_phase_survives_a_missing_day() {
        // Weekly peak every seventh day; day 10 has no row at all.
        let start = date("2023-03-01");
        let mut body = String::from("Date,City,PM2.5\n");
        for i in (0..42).filter(|&i| i != 10) {
            let day = start + chrono::Duration::days(i);
            let value = if i % 7 == 0 { 5 } else { 1 };
            body.push_str(&format!("{},Denver,{value}\n", day.format("%Y-%m-%d")));
        }
        let (_dir, mut c) = controller_with(&body, 7);
        c.handle(Interaction::SelectDataset("aq".into()));
        c.handle(Interaction::SetChartKind(ChartKind::SeasonalTrend));

        let ChartBody::Panels(panels) = &c.view().unwrap().chart.body else {
            panic!("expected decomposition panels");
        };
        assert_eq!(panels[2].title, "Seasonality");
        let ChartBody::Series(series) = &panels[2].body else {
            panic!("expected seasonality series");
        };
        let points = &series[0].points;
        assert_eq!(points.len(), 42);
        for (i, p) in points.iter().enumerate() {
            let expected = if i % 7 == 0 { 24.0 / 7.0 } else { -4.0 / 7.0 };
            assert_relative_eq!(p[1], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn failed_dataset_can_be_retried() {
        let (dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));

        let path = dir.path().join("broken.csv");
        fs::write(&path, "Date,City,PM2.5\n2023-02-01,Denver\n").unwrap();
        c.registry().register("broken", DatasetSource::File(path.clone()));

        c.handle(Interaction::SelectDataset("broken".into()));
        assert_eq!(c.failed_dataset(), Some("broken"));
        assert!(c.status_message().is_some());
        assert_eq!(c.selection().dataset.as_deref(), Some("aq"));

        // Still marked unavailable until retried, even once the file is fixed.
        fs::write(&path, "Date,City,PM2.5\n2023-02-01,Denver,4\n").unwrap();
        c.handle(Interaction::SelectDataset("broken".into()));
        assert_eq!(c.failed_dataset(), Some("broken"));

        c.handle(Interaction::RetryDataset("broken".into()));
        assert_eq!(c.failed_dataset(), None);
        assert_eq!(c.status_message(), None);
        assert_eq!(c.selection().dataset.as_deref(), Some("broken"));
        assert_eq!(c.view().unwrap().filtered.len(), 1);
    }

    #[test]
    fn unknown_dataset_is_not_offered_for_retry() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("nonexistent".into()));
        assert_eq!(c.failed_dataset(), None);
    }

    #[test]
    fn column_menus_prefer_configured_names() {
        let (_dir, mut c) = controller(7);
        c.handle(Interaction::SelectDataset("aq".into()));
        assert_eq!(c.pollutant_columns(), vec!["PM2.5", "Temperature"]);
        assert_eq!(c.weather_columns(), vec!["Temperature", "PM2.5"]);
    }
}
