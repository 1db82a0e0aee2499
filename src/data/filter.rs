use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::model::{Row, Table};

// ---------------------------------------------------------------------------
// Filter predicate: date range and location
// ---------------------------------------------------------------------------

/// Inclusive timestamp interval. `start > end` is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        DateRange { start, end }
    }

    /// Whole calendar days: `start` at midnight through the last instant of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        let last_instant =
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
        DateRange {
            start: start.and_time(NaiveTime::MIN),
            end: end.and_time(last_instant),
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Row predicate built fresh for every interaction. A `None` dimension is
/// inactive and lets every row through, including rows missing that value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub range: Option<DateRange>,
    pub city: Option<String>,
}

/// Why a filtered view has no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The date range lower bound is after its upper bound.
    InvalidRange,
    /// The predicates are valid but no row satisfies them.
    NoMatchingRows,
}

impl EmptyReason {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyReason::InvalidRange => "Start date is after end date",
            EmptyReason::NoMatchingRows => "No data for the selected filters",
        }
    }
}

impl FilterSpec {
    pub fn new(range: Option<DateRange>, city: Option<String>) -> Self {
        FilterSpec { range, city }
    }

    /// Does `row` of `table` satisfy every active predicate?
    pub fn matches(&self, table: &Table, row: &Row) -> bool {
        if let Some(range) = &self.range {
            match table.timestamp(row) {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }
        if let Some(city) = &self.city {
            let wanted = city.to_lowercase();
            match table.location(row) {
                Some(loc) if loc.to_lowercase() == wanted => {}
                _ => return false,
            }
        }
        true
    }

    /// Classify an empty filter output; `None` when `filtered` has rows.
    pub fn empty_reason(&self, filtered: &Table) -> Option<EmptyReason> {
        if !filtered.is_empty() {
            return None;
        }
        if self.range.is_some_and(|r| r.is_inverted()) {
            Some(EmptyReason::InvalidRange)
        } else {
            Some(EmptyReason::NoMatchingRows)
        }
    }
}

/// Return indices of rows that pass all active filters, in table order.
pub fn filtered_indices(table: &Table, filter: &FilterSpec) -> Vec<usize> {
    if filter.range.is_some_and(|r| r.is_inverted()) {
        return Vec::new();
    }
    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| filter.matches(table, row))
        .map(|(i, _)| i)
        .collect()
}

/// Subset of `table` satisfying `filter`, with row order preserved.
pub fn apply(table: &Table, filter: &FilterSpec) -> Table {
    let rows = filtered_indices(table, filter)
        .into_iter()
        .map(|i| table.rows()[i].clone())
        .collect();
    table.with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, ts};

    fn range(start: &str, end: &str) -> Option<DateRange> {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        Some(DateRange::from_dates(d(start), d(end)))
    }

    fn sample() -> Table {
        table(&[
            (Some("2023-01-01"), Some("Denver"), Some(10.0)),
            (Some("2023-01-02"), Some("Denver"), Some(20.0)),
            (Some("2023-01-02"), Some("Boulder"), Some(5.0)),
        ])
    }

    #[test]
    fn denver_scenario() {
        let spec = FilterSpec::new(range("2023-01-01", "2023-12-31"), Some("Denver".into()));
        let out = apply(&sample(), &spec);
        let expected = table(&[
            (Some("2023-01-01"), Some("Denver"), Some(10.0)),
            (Some("2023-01-02"), Some("Denver"), Some(20.0)),
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn city_match_ignores_case() {
        let spec = FilterSpec::new(None, Some("dEnVeR".into()));
        assert_eq!(filtered_indices(&sample(), &spec), vec![0, 1]);
    }

    #[test]
    fn inverted_range_is_empty_not_error() {
        let spec = FilterSpec::new(range("2023-12-31", "2023-01-01"), None);
        let out = apply(&sample(), &spec);
        assert!(out.is_empty());
        assert_eq!(spec.empty_reason(&out), Some(EmptyReason::InvalidRange));
    }

    #[test]
    fn no_match_reason() {
        let spec = FilterSpec::new(None, Some("Lyon".into()));
        let out = apply(&sample(), &spec);
        assert_eq!(spec.empty_reason(&out), Some(EmptyReason::NoMatchingRows));
        assert_eq!(spec.empty_reason(&sample()), None);
    }

    #[test]
    fn missing_values_only_excluded_by_active_dimension() {
        let t = table(&[
            (None, Some("Denver"), Some(1.0)),
            (Some("2023-05-05"), None, Some(2.0)),
            (Some("2023-05-06"), Some("Denver"), Some(3.0)),
        ]);
        let by_city = FilterSpec::new(None, Some("Denver".into()));
        assert_eq!(filtered_indices(&t, &by_city), vec![0, 2]);

        let by_date = FilterSpec::new(range("2023-01-01", "2023-12-31"), None);
        assert_eq!(filtered_indices(&t, &by_date), vec![1, 2]);

        assert_eq!(filtered_indices(&t, &FilterSpec::default()), vec![0, 1, 2]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let t = table(&[
            (Some("2023-01-01"), Some("A"), None),
            (Some("2023-01-31"), Some("A"), None),
            (Some("2023-02-01"), Some("A"), None),
        ]);
        let spec = FilterSpec::new(range("2023-01-01", "2023-01-31"), None);
        assert_eq!(filtered_indices(&t, &spec), vec![0, 1]);
    }

    #[test]
    fn sound_complete_ordered_and_idempotent() {
        let t = table(&[
            (Some("2022-12-31"), Some("Denver"), Some(1.0)),
            (Some("2023-03-01"), Some("Boulder"), Some(2.0)),
            (Some("2023-03-02"), Some("denver"), None),
            (None, Some("Denver"), Some(4.0)),
            (Some("2023-06-01"), Some("Denver"), Some(5.0)),
            (Some("2024-01-01"), Some("Denver"), Some(6.0)),
        ]);
        let spec = FilterSpec::new(range("2023-01-01", "2023-12-31"), Some("DENVER".into()));
        let out = apply(&t, &spec);

        // soundness
        assert!(out.rows().iter().all(|r| spec.matches(&out, r)));
        // completeness and order
        let expected: Vec<_> = t
            .rows()
            .iter()
            .filter(|r| spec.matches(&t, r))
            .cloned()
            .collect();
        assert_eq!(out.rows(), expected.as_slice());
        assert_eq!(out.len(), 2);
        assert_eq!(out.timestamp(&out.rows()[0]), Some(ts("2023-03-02")));
        // idempotence
        assert_eq!(apply(&out, &spec), out);
    }

    #[test]
    fn empty_input_is_valid() {
        let t = table(&[]);
        let spec = FilterSpec::new(range("2023-01-01", "2023-01-02"), Some("A".into()));
        assert!(apply(&t, &spec).is_empty());
    }
}
