use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::bucket::TimeBucket;
use crate::data::loader::ColumnRoles;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

/// Settings read from `dashboard.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub air_quality_dir: PathBuf,
    pub weather_dir: PathBuf,
    /// Header of the timestamp column (case-insensitive).
    pub timestamp_column: String,
    /// Header of the location column (case-insensitive).
    pub location_column: String,
    /// Preferred pollutant columns, in menu order.
    pub pollutants: Vec<String>,
    /// Preferred weather columns, in menu order.
    pub weather_factors: Vec<String>,
    /// Observations per seasonal cycle for the decomposition panels.
    pub seasonal_period: usize,
    pub default_bucket: TimeBucket,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            air_quality_dir: PathBuf::from("data/air_quality"),
            weather_dir: PathBuf::from("data/weather"),
            timestamp_column: "Date".to_string(),
            location_column: "City".to_string(),
            pollutants: ["PM2.5", "PM10", "NO2", "O3"].map(String::from).to_vec(),
            weather_factors: ["Temperature", "Humidity", "Wind Speed"].map(String::from).to_vec(),
            seasonal_period: 365,
            default_bucket: TimeBucket::Month,
        }
    }
}

impl DashboardConfig {
    pub fn roles(&self) -> ColumnRoles {
        ColumnRoles {
            timestamp: self.timestamp_column.clone(),
            location: self.location_column.clone(),
        }
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Use `explicit` if given, else [`DEFAULT_CONFIG_FILE`] when it exists,
    /// else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }
}
