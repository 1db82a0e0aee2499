use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{CellValue, Column, ColumnKind, Row, Schema, Table};
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Column roles
// ---------------------------------------------------------------------------

/// Header names of the timestamp and location columns, matched
/// case-insensitively against the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub timestamp: String,
    pub location: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        ColumnRoles {
            timestamp: "Date".to_string(),
            location: "City".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a measurement table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one observation per record
/// * `.parquet` – flat columns; every column is read through its text form
pub fn load_file(path: &Path, roles: &ColumnRoles) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let raw = match ext.as_str() {
        "csv" => read_csv(path)?,
        "parquet" | "pq" => read_parquet(path)?,
        _ => return Err(DashboardError::UnsupportedFormat(path.to_path_buf())),
    };
    build_table(path, raw, roles)
}

/// Whether `path` has an extension [`load_file`] understands.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "parquet" | "pq"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Untyped intermediate form shared by both readers
// ---------------------------------------------------------------------------

struct RawTable {
    headers: Vec<String>,
    records: Vec<RawRecord>,
}

struct RawRecord {
    /// 1-based line in the source (the header is line 1).
    line: u64,
    cells: Vec<Option<String>>,
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DashboardError::parse(path, 1, format!("reading header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            DashboardError::parse(path, line, e.to_string())
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cells = record.iter().map(|c| Some(c.to_string())).collect();
        records.push(RawRecord { line, cells });
    }

    Ok(RawTable { headers, records })
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Every column is cast to Utf8 through Arrow, so dates, timestamps and
/// numbers follow exactly the same typing rules as CSV cells.
fn read_parquet(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| DashboardError::parse(path, 0, format!("reading parquet metadata: {e}")))?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| DashboardError::parse(path, 0, format!("building parquet reader: {e}")))?;

    let mut records = Vec::new();
    let mut line = 1u64;
    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| DashboardError::parse(path, line + 1, format!("reading record batch: {e}")))?;

        let columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|col| cast(col, &DataType::Utf8))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| DashboardError::parse(path, line + 1, format!("converting column: {e}")))?;

        for row in 0..batch.num_rows() {
            line += 1;
            let mut cells = Vec::with_capacity(columns.len());
            for col in &columns {
                let strings = col.as_string_opt::<i32>().ok_or_else(|| {
                    DashboardError::parse(path, line, "column is not representable as text")
                })?;
                cells.push((!strings.is_null(row)).then(|| strings.value(row).to_string()));
            }
            records.push(RawRecord { line, cells });
        }
    }

    Ok(RawTable { headers, records })
}

// ---------------------------------------------------------------------------
// Typing
// ---------------------------------------------------------------------------

const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

fn is_missing_token(s: &str) -> bool {
    MISSING_TOKENS.contains(&s.trim())
}

fn find_column(headers: &[String], wanted: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted.trim()))
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Parse the timestamp formats found in air-quality exports.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn infer_kind(raw: &RawTable, idx: usize) -> ColumnKind {
    let all_numeric = raw
        .records
        .iter()
        .filter_map(|r| r.cells.get(idx).and_then(|c| c.as_deref()))
        .filter(|s| !is_missing_token(s))
        .all(|s| parse_number(s).is_some());
    if all_numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

fn build_table(path: &Path, raw: RawTable, roles: &ColumnRoles) -> Result<Table> {
    let missing = |column: &str| DashboardError::MissingColumn {
        file: path.to_path_buf(),
        column: column.to_string(),
    };
    let ts_idx = find_column(&raw.headers, &roles.timestamp).ok_or_else(|| missing(&roles.timestamp))?;
    let loc_idx = find_column(&raw.headers, &roles.location).ok_or_else(|| missing(&roles.location))?;

    let columns: Vec<Column> = raw
        .headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = if i == ts_idx {
                ColumnKind::Timestamp
            } else if i == loc_idx {
                ColumnKind::Categorical
            } else {
                infer_kind(&raw, i)
            };
            Column::new(name.trim(), kind)
        })
        .collect();

    let mut rows = Vec::with_capacity(raw.records.len());
    for record in &raw.records {
        if record.cells.len() != columns.len() {
            return Err(DashboardError::parse(
                path,
                record.line,
                format!(
                    "expected {} fields, found {}",
                    columns.len(),
                    record.cells.len()
                ),
            ));
        }
        let mut cells = Vec::with_capacity(columns.len());
        for (column, cell) in columns.iter().zip(&record.cells) {
            let text = match cell.as_deref() {
                Some(s) if !is_missing_token(s) => s,
                _ => {
                    cells.push(CellValue::Missing);
                    continue;
                }
            };
            let value = match column.kind {
                ColumnKind::Timestamp => CellValue::Timestamp(parse_timestamp(text).ok_or_else(|| {
                    DashboardError::parse(
                        path,
                        record.line,
                        format!("invalid timestamp '{text}' in column '{}'", column.name),
                    )
                })?),
                ColumnKind::Numeric => match parse_number(text) {
                    Some(v) if v.is_finite() => CellValue::Number(v),
                    _ => CellValue::Missing,
                },
                ColumnKind::Categorical => CellValue::Text(text.to_string()),
            };
            cells.push(value);
        }
        rows.push(Row::new(cells));
    }

    let schema = Schema::new(columns, ts_idx, loc_idx).ok_or_else(|| {
        DashboardError::parse(path, 1, "timestamp and location must be distinct columns")
    })?;
    Ok(Table::new(Arc::new(schema), rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_types_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "aq.csv",
            "Date,City,PM2.5,Station\n\
             2023-01-01,Denver,10,north\n\
             2023-01-02,Denver,NA,south\n\
             2023-01-02,Boulder,5.5,east\n",
        );
        let table = load_file(&path, &ColumnRoles::default()).unwrap();
        let schema = table.schema();
        assert_eq!(table.len(), 3);
        assert_eq!(schema.timestamp_column(), "Date");
        assert_eq!(schema.location_column(), "City");
        assert_eq!(schema.numeric_columns(), vec!["PM2.5"]);
        assert_eq!(schema.columns()[3].kind, ColumnKind::Categorical);

        let pm = table.numeric_column("PM2.5").unwrap();
        assert_eq!(pm, vec![Some(10.0), None, Some(5.5)]);
    }

    #[test]
    fn role_headers_match_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "w.csv", "date,CITY,Temperature\n2023-01-01 06:30,Denver,-3\n");
        let table = load_file(&path, &ColumnRoles::default()).unwrap();
        let ts = table.timestamp(&table.rows()[0]).unwrap();
        assert_eq!(ts.format("%H:%M").to_string(), "06:30");
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "Date,City,PM2.5\n2023-01-01,Denver,1\n2023-01-02,Denver\n",
        );
        match load_file(&path, &ColumnRoles::default()) {
            Err(DashboardError::Parse { file, line, .. }) => {
                assert_eq!(file, path);
                assert_eq!(line, 3);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "bad.csv", "Date,City,PM2.5\nyesterday,Denver,1\n");
        let err = load_file(&path, &ColumnRoles::default()).unwrap_err();
        assert!(matches!(err, DashboardError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn missing_role_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "nocity.csv", "Date,PM2.5\n2023-01-01,1\n");
        let err = load_file(&path, &ColumnRoles::default()).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { ref column, .. } if column == "City"));
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("data.xlsx"), &ColumnRoles::default()).unwrap_err();
        assert!(matches!(err, DashboardError::UnsupportedFormat(_)));
        assert!(!is_supported(Path::new("data.xlsx")));
        assert!(is_supported(Path::new("DATA.CSV")));
    }

    fn write_parquet(dir: &tempfile::TempDir, name: &str, columns: Vec<(&str, ArrayRef)>) -> std::path::PathBuf {
        use arrow::datatypes::{Field, Schema as ArrowSchema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let schema = Arc::new(ArrowSchema::new(fields));
        let arrays = columns.into_iter().map(|(_, a)| a).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let path = dir.path().join(name);
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    #[test]
    fn parquet_columns_are_typed_like_csv() {
        use arrow::array::{Date32Array, Float64Array, StringArray, TimestampSecondArray};

        let dir = tempfile::tempdir().unwrap();
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let epoch = day("1970-01-01");
        let days = |s: &str| (day(s) - epoch).num_days() as i32;
        let reading = day("2023-01-01").and_hms_opt(6, 30, 0).unwrap().and_utc().timestamp();

        let path = write_parquet(
            &dir,
            "aq.parquet",
            vec![
                ("Date", Arc::new(StringArray::from(vec!["2023-01-01", "2023-01-02", "2023-01-03"])) as ArrayRef),
                ("City", Arc::new(StringArray::from(vec!["Denver", "Denver", "Boulder"]))),
                ("PM2.5", Arc::new(Float64Array::from(vec![Some(10.5), None, Some(4.0)]))),
                (
                    "Sampled",
                    Arc::new(Date32Array::from(vec![days("2023-01-01"), days("2023-01-02"), days("2023-01-03")])),
                ),
                ("Reading", Arc::new(TimestampSecondArray::from(vec![reading, reading + 3600, reading + 7200]))),
            ],
        );

        let table = load_file(&path, &ColumnRoles::default()).unwrap();
        let schema = table.schema();
        assert_eq!(table.len(), 3);
        assert_eq!(schema.columns()[0].kind, ColumnKind::Timestamp);
        assert_eq!(schema.numeric_columns(), vec!["PM2.5"]);
        assert_eq!(table.numeric_column("PM2.5").unwrap(), vec![Some(10.5), None, Some(4.0)]);
        assert_eq!(table.rows()[1].get(2), &CellValue::Missing);
        assert_eq!(table.timestamp(&table.rows()[2]), Some(day("2023-01-03").and_time(NaiveTime::MIN)));
        assert_eq!(table.location(&table.rows()[2]), Some("Boulder"));

        // Date32 and Timestamp columns serve as the timestamp role just as well.
        for column in ["Sampled", "Reading"] {
            let roles = ColumnRoles {
                timestamp: column.to_string(),
                ..ColumnRoles::default()
            };
            let table = load_file(&path, &roles).unwrap();
            let idx = table.schema().index_of(column).unwrap();
            assert_eq!(table.schema().columns()[idx].kind, ColumnKind::Timestamp);
            let first = table.timestamp(&table.rows()[0]).unwrap();
            assert_eq!(first.date(), day("2023-01-01"));
        }
        let roles = ColumnRoles {
            timestamp: "Reading".to_string(),
            ..ColumnRoles::default()
        };
        let table = load_file(&path, &roles).unwrap();
        let last = table.timestamp(&table.rows()[2]).unwrap();
        assert_eq!(last.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn parquet_bad_timestamp_reports_record_line() {
        use arrow::array::{Float64Array, StringArray};

        let dir = tempfile::tempdir().unwrap();
        let path = write_parquet(
            &dir,
            "bad.parquet",
            vec![
                ("Date", Arc::new(StringArray::from(vec!["2023-01-01", "2023-01-02", "soon"])) as ArrayRef),
                ("City", Arc::new(StringArray::from(vec!["Denver", "Denver", "Denver"]))),
                ("PM2.5", Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0]))),
            ],
        );
        match load_file(&path, &ColumnRoles::default()) {
            Err(DashboardError::Parse { file, line, message }) => {
                assert_eq!(file, path);
                // header counts as line 1, so the third record is line 4
                assert_eq!(line, 4);
                assert!(message.contains("soon"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_formats() {
        let expect = NaiveDate::from_ymd_opt(2023, 4, 5).unwrap().and_time(NaiveTime::MIN);
        for s in ["2023-04-05", "2023/04/05", "05/04/2023", "2023-04-05T00:00:00", "2023-04-05T00:00:00Z"] {
            assert_eq!(parse_timestamp(s), Some(expect), "{s}");
        }
        assert_eq!(parse_timestamp("April 5th"), None);
    }
}
