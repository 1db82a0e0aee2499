//! Writes a deterministic synthetic dataset for trying out the dashboard.
//!
//! Layout (relative to the output directory, `data` by default):
//! - `air_quality/<city>.csv`: Date, City, PM2.5, PM10, NO2, O3
//! - `weather/weather.parquet`: Date, City, Temperature, Humidity, Wind Speed

use std::f64::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

const DAYS: i64 = 730;

/// Per-city baseline: (name, PM2.5 level, winter temperature, summer temperature).
const CITIES: [(&str, f64, f64, f64); 4] = [
    ("Denver", 9.0, -1.0, 24.0),
    ("Boulder", 6.5, -2.0, 22.0),
    ("Phoenix", 11.0, 13.0, 35.0),
    ("Seattle", 7.5, 5.0, 19.0),
];

/// splitmix64; enough for reproducible noise.
struct Noise(u64);

impl Noise {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Roughly normal: sum of twelve uniforms.
    fn normal(&mut self, std_dev: f64) -> f64 {
        let sum: f64 = (0..12).map(|_| self.unit()).sum();
        (sum - 6.0) * std_dev
    }

    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }
}

struct WeatherDay {
    temperature: Option<f64>,
    humidity: Option<f64>,
    wind: Option<f64>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// 0 in mid-January, 1 in mid-July.
fn summer_weight(date: NaiveDate) -> f64 {
    let phase = (date.ordinal0() as f64 - 15.0) / 365.0 * TAU;
    (1.0 - phase.cos()) / 2.0
}

fn weather_for(date: NaiveDate, winter: f64, summer: f64, rng: &mut Noise) -> WeatherDay {
    let w = summer_weight(date);
    let temperature = winter + (summer - winter) * w + rng.normal(2.5);
    let humidity = (65.0 - 25.0 * w + rng.normal(8.0)).clamp(5.0, 100.0);
    let wind = (3.0 + rng.normal(1.2)).abs();
    WeatherDay {
        temperature: (!rng.chance(0.01)).then(|| round1(temperature)),
        humidity: (!rng.chance(0.01)).then(|| round1(humidity)),
        wind: (!rng.chance(0.01)).then(|| round1(wind)),
    }
}

fn write_air_quality(
    dir: &Path,
    city: &str,
    base: f64,
    days: &[(NaiveDate, WeatherDay)],
    rng: &mut Noise,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", city.to_lowercase()));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    writer.write_record(["Date", "City", "PM2.5", "PM10", "NO2", "O3"])?;

    for (date, weather) in days {
        let w = summer_weight(*date);
        let wind = weather.wind.unwrap_or(3.0);
        // Winter inversions trap particulates, stronger wind disperses them.
        let pm25 = (base * (1.4 - 0.6 * w) - 0.8 * (wind - 3.0) + rng.normal(2.0)).max(0.5);
        let pm10 = (pm25 * 1.8 + rng.normal(3.0)).max(1.0);
        let no2 = (22.0 - 8.0 * w + rng.normal(4.0)).max(1.0);
        // Ozone follows sunshine and heat.
        let temp = weather.temperature.unwrap_or(15.0);
        let o3 = (25.0 + 20.0 * w + 0.4 * temp + rng.normal(5.0)).max(1.0);

        let cell = |v: f64, rng: &mut Noise| {
            if rng.chance(0.02) {
                "NA".to_string()
            } else {
                format!("{:.1}", v)
            }
        };
        let record = [
            date.format("%Y-%m-%d").to_string(),
            city.to_string(),
            cell(pm25, rng),
            cell(pm10, rng),
            cell(no2, rng),
            cell(o3, rng),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path)
}

fn write_weather(path: &Path, rows: &[(&str, NaiveDate, &WeatherDay)]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Date", DataType::Utf8, false),
        Field::new("City", DataType::Utf8, false),
        Field::new("Temperature", DataType::Float64, true),
        Field::new("Humidity", DataType::Float64, true),
        Field::new("Wind Speed", DataType::Float64, true),
    ]));

    let dates: StringArray = rows
        .iter()
        .map(|(_, d, _)| Some(d.format("%Y-%m-%d").to_string()))
        .collect();
    let cities: StringArray = rows.iter().map(|(c, _, _)| Some(*c)).collect();
    let temperature: Float64Array = rows.iter().map(|(_, _, w)| w.temperature).collect();
    let humidity: Float64Array = rows.iter().map(|(_, _, w)| w.humidity).collect();
    let wind: Float64Array = rows.iter().map(|(_, _, w)| w.wind).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(dates),
        Arc::new(cities),
        Arc::new(temperature),
        Arc::new(humidity),
        Arc::new(wind),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = fs::File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let out = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "data".to_string()));
    let aq_dir = out.join("air_quality");
    let weather_dir = out.join("weather");
    fs::create_dir_all(&aq_dir).with_context(|| format!("Cannot create {}", aq_dir.display()))?;
    fs::create_dir_all(&weather_dir)
        .with_context(|| format!("Cannot create {}", weather_dir.display()))?;

    let start = NaiveDate::from_ymd_opt(2022, 1, 1).context("invalid start date")?;
    let mut rng = Noise(42);

    let mut per_city = Vec::with_capacity(CITIES.len());
    for (city, base, winter, summer) in CITIES {
        let days: Vec<(NaiveDate, WeatherDay)> = (0..DAYS)
            .map(|i| {
                let date = start + Duration::days(i);
                (date, weather_for(date, winter, summer, &mut rng))
            })
            .collect();
        let path = write_air_quality(&aq_dir, city, base, &days, &mut rng)?;
        println!("Wrote {}", path.display());
        per_city.push((city, days));
    }

    let rows: Vec<(&str, NaiveDate, &WeatherDay)> = per_city
        .iter()
        .flat_map(|(city, days)| days.iter().map(move |(d, w)| (*city, *d, w)))
        .collect();
    let weather_path = weather_dir.join("weather.parquet");
    write_weather(&weather_path, &rows)?;
    println!("Wrote {} ({} rows)", weather_path.display(), rows.len());

    Ok(())
}
