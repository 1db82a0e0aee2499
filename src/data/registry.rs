use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use super::join::{concat, inner_join};
use super::loader::{is_supported, load_file, ColumnRoles};
use super::model::Dataset;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};

pub const ALL_AIR_QUALITY: &str = "air_quality (all)";
pub const ALL_WEATHER: &str = "weather (all)";
pub const MERGED: &str = "air quality + weather";

// ---------------------------------------------------------------------------
// Dataset sources
// ---------------------------------------------------------------------------

/// Where a named dataset's rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A single CSV or Parquet file.
    File(PathBuf),
    /// Rows of several files appended in order.
    Concat(Vec<PathBuf>),
    /// Inner join of two other registered datasets on timestamp and location.
    Join { left: String, right: String },
}

// ---------------------------------------------------------------------------
// Registry with process-wide cache
// ---------------------------------------------------------------------------

/// Maps dataset names to sources and caches every table it loads.
///
/// Tables are read on first [`get`](Self::get) and kept until the registry is
/// dropped. A load failure is remembered so the same broken file is not
/// re-read on every interaction; [`retry`](Self::retry) forgets it. The
/// registry is `Sync` and may be shared between controllers behind an `Arc`.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    roles: ColumnRoles,
    sources: RwLock<BTreeMap<String, DatasetSource>>,
    cache: RwLock<HashMap<String, Arc<Dataset>>>,
    failures: RwLock<HashMap<String, String>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl DatasetRegistry {
    pub fn new(roles: ColumnRoles) -> Self {
        DatasetRegistry {
            roles,
            ..Default::default()
        }
    }

    /// Register every data file under the configured air-quality and weather
    /// directories, their per-directory concatenations and the merged view.
    pub fn discover(config: &DashboardConfig) -> Self {
        let registry = DatasetRegistry::new(config.roles());
        let aq_files = list_data_files(&config.air_quality_dir);
        let weather_files = list_data_files(&config.weather_dir);

        for (prefix, files) in [("air_quality", &aq_files), ("weather", &weather_files)] {
            for path in files {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                registry.register(format!("{prefix}/{file_name}"), DatasetSource::File(path.clone()));
            }
        }
        if !aq_files.is_empty() {
            registry.register(ALL_AIR_QUALITY, DatasetSource::Concat(aq_files.clone()));
        }
        if !weather_files.is_empty() {
            registry.register(ALL_WEATHER, DatasetSource::Concat(weather_files.clone()));
        }
        if !aq_files.is_empty() && !weather_files.is_empty() {
            registry.register(
                MERGED,
                DatasetSource::Join {
                    left: ALL_AIR_QUALITY.to_string(),
                    right: ALL_WEATHER.to_string(),
                },
            );
        }
        info!(
            "Discovered {} air quality and {} weather files",
            aq_files.len(),
            weather_files.len()
        );
        registry
    }

    /// Add or replace a source. Replacing drops the cached table and any
    /// recorded failure for `name`.
    pub fn register(&self, name: impl Into<String>, source: DatasetSource) {
        let name = name.into();
        write(&self.cache).remove(&name);
        write(&self.failures).remove(&name);
        write(&self.sources).insert(name, source);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        read(&self.sources).keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.sources).contains_key(name)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        read(&self.cache).contains_key(name)
    }

    /// The recorded load failure for `name`, if it is marked unavailable.
    pub fn failure(&self, name: &str) -> Option<String> {
        read(&self.failures).get(name).cloned()
    }

    /// Forget the recorded failure for `name`, and for every dataset a join
    /// reads from, so the next `get` reads the sources again.
    pub fn retry(&self, name: &str) {
        let mut pending = vec![name.to_string()];
        let mut seen: Vec<String> = Vec::new();
        while let Some(next) = pending.pop() {
            if seen.contains(&next) {
                continue;
            }
            if write(&self.failures).remove(&next).is_some() {
                debug!("Cleared failure mark of '{next}'");
            }
            if let Some(DatasetSource::Join { left, right }) = read(&self.sources).get(&next) {
                pending.push(left.clone());
                pending.push(right.clone());
            }
            seen.push(next);
        }
    }

    /// Return the dataset called `name`, loading and caching it on first use.
    pub fn get(&self, name: &str) -> Result<Arc<Dataset>> {
        self.get_inner(name, &mut Vec::new())
    }

    fn get_inner(&self, name: &str, visiting: &mut Vec<String>) -> Result<Arc<Dataset>> {
        if let Some(ds) = read(&self.cache).get(name) {
            return Ok(Arc::clone(ds));
        }
        if let Some(reason) = self.failure(name) {
            return Err(DashboardError::Unavailable {
                name: name.to_string(),
                reason,
            });
        }
        let source = read(&self.sources)
            .get(name)
            .cloned()
            .ok_or_else(|| DashboardError::NotFound(name.to_string()))?;

        if visiting.iter().any(|v| v == name) {
            return Err(DashboardError::Unavailable {
                name: name.to_string(),
                reason: format!("cyclic join through {}", visiting.join(" -> ")),
            });
        }
        visiting.push(name.to_string());
        let loaded = self.load(name, &source, visiting);
        visiting.pop();

        match loaded {
            Ok(dataset) => {
                info!(
                    "Loaded dataset '{name}': {} rows, {} columns",
                    dataset.len(),
                    dataset.table.schema().len()
                );
                let mut cache = write(&self.cache);
                let entry = cache
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(dataset));
                Ok(Arc::clone(entry))
            }
            Err(e) => {
                warn!("Dataset '{name}' marked unavailable: {e}");
                write(&self.failures).insert(name.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    fn load(&self, name: &str, source: &DatasetSource, visiting: &mut Vec<String>) -> Result<Dataset> {
        debug!("Loading dataset '{name}' from {source:?}");
        let table = match source {
            DatasetSource::File(path) => load_file(path, &self.roles)?,
            DatasetSource::Concat(paths) => {
                let tables = paths
                    .iter()
                    .map(|p| load_file(p, &self.roles))
                    .collect::<Result<Vec<_>>>()?;
                concat(&tables).ok_or_else(|| DashboardError::Unavailable {
                    name: name.to_string(),
                    reason: "no files to combine".to_string(),
                })?
            }
            DatasetSource::Join { left, right } => {
                let l = self.get_inner(left, visiting)?;
                let r = self.get_inner(right, visiting)?;
                inner_join(&l.table, &r.table)
            }
        };
        Ok(Dataset::new(name, table))
    }
}

/// Supported data files directly inside `dir`, sorted by file name.
fn list_data_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping data directory {}: {e}", dir.display());
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, DashboardConfig) {
        let dir = tempfile::tempdir().unwrap();
        let aq = dir.path().join("air_quality");
        let weather = dir.path().join("weather");
        fs::create_dir_all(&aq).unwrap();
        fs::create_dir_all(&weather).unwrap();
        fs::write(
            aq.join("denver.csv"),
            "Date,City,PM2.5\n2023-01-01,Denver,10\n2023-01-02,Denver,20\n",
        )
        .unwrap();
        fs::write(aq.join("boulder.csv"), "Date,City,PM2.5\n2023-01-02,Boulder,5\n").unwrap();
        fs::write(aq.join("notes.txt"), "ignored").unwrap();
        fs::write(
            weather.join("all.csv"),
            "Date,City,Temperature\n2023-01-01,Denver,-1\n2023-01-02,Boulder,4\n",
        )
        .unwrap();
        let config = DashboardConfig {
            air_quality_dir: aq,
            weather_dir: weather,
            ..DashboardConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn discover_registers_files_and_derived_views() {
        let (_dir, config) = fixture();
        let registry = DatasetRegistry::discover(&config);
        assert_eq!(
            registry.names(),
            vec![
                MERGED,
                ALL_AIR_QUALITY,
                "air_quality/boulder.csv",
                "air_quality/denver.csv",
                "weather (all)",
                "weather/all.csv",
            ]
        );
    }

    #[test]
    fn concat_and_join_views() {
        let (_dir, config) = fixture();
        let registry = DatasetRegistry::discover(&config);
        let all = registry.get(ALL_AIR_QUALITY).unwrap();
        // boulder.csv sorts first
        assert_eq!(all.table.numeric_column("PM2.5").unwrap(), vec![Some(5.0), Some(10.0), Some(20.0)]);

        let merged = registry.get(MERGED).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(registry.is_cached(ALL_WEATHER));
    }

    #[test]
    fn unknown_name_is_not_found_and_cache_survives() {
        let (_dir, config) = fixture();
        let registry = DatasetRegistry::discover(&config);
        let first = registry.get("air_quality/denver.csv").unwrap();

        let err = registry.get("nonexistent").unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(ref n) if n == "nonexistent"));

        assert!(registry.is_cached("air_quality/denver.csv"));
        let again = registry.get("air_quality/denver.csv").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn failed_load_marks_unavailable_until_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        fs::write(&path, "Date,City,PM2.5\n2023-01-01,Denver\n").unwrap();

        let registry = DatasetRegistry::new(ColumnRoles::default());
        registry.register("broken", DatasetSource::File(path.clone()));
        assert!(matches!(registry.get("broken"), Err(DashboardError::Parse { .. })));
        assert!(matches!(registry.get("broken"), Err(DashboardError::Unavailable { .. })));
        assert!(registry.failure("broken").is_some());

        fs::write(&path, "Date,City,PM2.5\n2023-01-01,Denver,3\n").unwrap();
        registry.retry("broken");
        assert_eq!(registry.get("broken").unwrap().len(), 1);
    }

    #[test]
    fn retrying_a_join_clears_its_failed_components() {
        let (dir, config) = fixture();
        let weather = dir.path().join("weather").join("all.csv");
        fs::write(&weather, "Date,City,Temperature\n2023-01-01,Denver\n").unwrap();

        let registry = DatasetRegistry::discover(&config);
        assert!(registry.get(MERGED).is_err());
        assert!(registry.failure(MERGED).is_some());
        assert!(registry.failure(ALL_WEATHER).is_some());

        fs::write(&weather, "Date,City,Temperature\n2023-01-01,Denver,-1\n").unwrap();
        registry.retry(MERGED);
        assert_eq!(registry.failure(ALL_WEATHER), None);
        assert_eq!(registry.get(MERGED).unwrap().len(), 1);
        assert!(registry.is_cached(ALL_WEATHER));
    }

    #[test]
    fn reload_is_idempotent() {
        let (_dir, config) = fixture();
        let a = DatasetRegistry::discover(&config).get(MERGED).unwrap();
        let b = DatasetRegistry::discover(&config).get(MERGED).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn self_join_cycle_is_reported() {
        let registry = DatasetRegistry::new(ColumnRoles::default());
        registry.register(
            "loop",
            DatasetSource::Join {
                left: "loop".into(),
                right: "loop".into(),
            },
        );
        assert!(matches!(registry.get("loop"), Err(DashboardError::Unavailable { .. })));
    }

    #[test]
    fn missing_directories_are_skipped() {
        let config = DashboardConfig {
            air_quality_dir: PathBuf::from("/nonexistent/aq"),
            weather_dir: PathBuf::from("/nonexistent/weather"),
            ..DashboardConfig::default()
        };
        assert!(DatasetRegistry::discover(&config).names().is_empty());
    }
}
