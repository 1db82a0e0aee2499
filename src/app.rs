use std::sync::Arc;

use airq_dashboard::config::DashboardConfig;
use airq_dashboard::data::registry::{DatasetRegistry, MERGED};
use airq_dashboard::state::{DashboardController, Interaction};
use eframe::egui;

use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct AirQualityApp {
    pub controller: DashboardController,
}

impl AirQualityApp {
    /// Build the app and open the merged dataset (or the first one found).
    pub fn new(registry: Arc<DatasetRegistry>, config: DashboardConfig) -> Self {
        let initial = if registry.contains(MERGED) {
            Some(MERGED.to_string())
        } else {
            registry.names().into_iter().next()
        };
        let mut controller = DashboardController::new(registry, config);
        match initial {
            Some(name) => controller.handle(Interaction::SelectDataset(name)),
            None => controller.set_status(
                "No datasets found. Use File → Open… or run `cargo run --bin generate_sample`.",
            ),
        }
        Self { controller }
    }
}

impl eframe::App for AirQualityApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.controller);
        });

        // ---- Left side panel: dataset, filters, chart controls ----
        egui::SidePanel::left("control_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.controller);
            });

        // ---- Bottom panel: raw data of the filtered selection ----
        if self.controller.selection().show_raw {
            if let Some(view) = self.controller.view() {
                egui::TopBottomPanel::bottom("raw_data")
                    .resizable(true)
                    .default_height(240.0)
                    .show(ctx, |ui| {
                        ui.strong(format!("Raw data ({} rows)", view.filtered.len()));
                        table::raw_table(ui, &view.filtered);
                    });
            }
        }

        // ---- Central panel: chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::chart_view(ui, self.controller.view());
        });
    }
}
