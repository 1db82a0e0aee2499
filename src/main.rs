mod app;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use airq_dashboard::config::DashboardConfig;
use airq_dashboard::data::registry::DatasetRegistry;
use anyhow::Context;
use app::AirQualityApp;
use eframe::egui;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Optional first argument: path to a JSON config file.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DashboardConfig::resolve(config_path.as_deref()).context("loading configuration")?;
    let registry = Arc::new(DatasetRegistry::discover(&config));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Urban Air Quality and Weather Analysis",
        options,
        Box::new(|_cc| Ok(Box::new(AirQualityApp::new(registry, config)))),
    )
    .map_err(|e| anyhow::anyhow!("running dashboard: {e}"))
}
