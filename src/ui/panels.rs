use airq_dashboard::analysis::bucket::TimeBucket;
use airq_dashboard::chart::ChartKind;
use airq_dashboard::data::loader::is_supported;
use airq_dashboard::data::registry::DatasetSource;
use airq_dashboard::state::{DashboardController, Interaction};
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

// ---------------------------------------------------------------------------
// Left side panel – dataset, filter and chart widgets
// ---------------------------------------------------------------------------

/// Render the left control panel.
///
/// Widgets only record interactions; they are applied to the controller
/// after the panel is drawn so each one triggers exactly one render.
pub fn side_panel(ui: &mut Ui, controller: &mut DashboardController) {
    let mut actions: Vec<Interaction> = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            dataset_section(ui, controller, &mut actions);

            if controller.dataset().is_none() {
                return;
            }
            ui.add_space(8.0);
            filter_section(ui, controller, &mut actions);
            ui.add_space(8.0);
            chart_section(ui, controller, &mut actions);
        });

    for action in actions {
        controller.handle(action);
    }
}

fn dataset_section(ui: &mut Ui, controller: &DashboardController, actions: &mut Vec<Interaction>) {
    ui.heading("Dataset");
    ui.separator();

    let registry = controller.registry();
    let current = controller.selection().dataset.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("dataset")
        .selected_text(&current)
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for name in registry.names() {
                let mut text = RichText::new(&name);
                if registry.failure(&name).is_some() {
                    text = text.color(Color32::GRAY).italics();
                }
                if ui.selectable_label(current == name, text).clicked() && current != name {
                    actions.push(Interaction::SelectDataset(name));
                }
            }
        });

    // Greyed entries stay selectable; picking one surfaces its failure here.
    if let Some(failed) = controller.failed_dataset() {
        if let Some(reason) = registry.failure(failed) {
            ui.label(RichText::new(format!("'{failed}' is unavailable")).color(Color32::RED));
            ui.label(RichText::new(reason).color(Color32::RED).small());
            if ui.small_button("Retry").clicked() {
                actions.push(Interaction::RetryDataset(failed.to_string()));
            }
        }
    }
}

fn filter_section(ui: &mut Ui, controller: &DashboardController, actions: &mut Vec<Interaction>) {
    ui.heading("Filters");
    ui.separator();
    let selection = controller.selection();

    // ---- Date range ----
    if let (Some(mut start), Some(mut end)) = (selection.start, selection.end) {
        let mut changed = false;
        egui::Grid::new("date_range").num_columns(2).show(ui, |ui: &mut Ui| {
            ui.label("Start date");
            changed |= ui
                .add(DatePickerButton::new(&mut start).id_salt("start_date"))
                .changed();
            ui.end_row();
            ui.label("End date");
            changed |= ui
                .add(DatePickerButton::new(&mut end).id_salt("end_date"))
                .changed();
            ui.end_row();
        });
        if changed {
            actions.push(Interaction::SetDateRange { start, end });
        }
    }

    // ---- City ----
    ui.add_space(4.0);
    ui.strong("City");
    let current = selection.city.clone();
    egui::ComboBox::from_id_salt("city")
        .selected_text(current.as_deref().unwrap_or("All"))
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            if ui.selectable_label(current.is_none(), "All").clicked() && current.is_some() {
                actions.push(Interaction::SetCity(None));
            }
            for city in controller.cities() {
                let selected = current.as_deref() == Some(city.as_str());
                if ui.selectable_label(selected, city).clicked() && !selected {
                    actions.push(Interaction::SetCity(Some(city.clone())));
                }
            }
        });

    if let Some(view) = controller.view() {
        ui.label(
            RichText::new(format!("{} rows match", view.filtered.len()))
                .small()
                .weak(),
        );
    }
}

fn chart_section(ui: &mut Ui, controller: &DashboardController, actions: &mut Vec<Interaction>) {
    ui.heading("Chart");
    ui.separator();
    let selection = controller.selection();

    egui::ComboBox::from_id_salt("chart_kind")
        .selected_text(selection.chart.to_string())
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in ChartKind::ALL {
                if ui
                    .selectable_label(selection.chart == kind, kind.to_string())
                    .clicked()
                    && selection.chart != kind
                {
                    actions.push(Interaction::SetChartKind(kind));
                }
            }
        });

    if selection.chart != ChartKind::CorrelationHeatmap {
        ui.add_space(4.0);
        ui.strong("Pollutant");
        column_combo(
            ui,
            "pollutant",
            selection.primary.as_deref(),
            &controller.pollutant_columns(),
            |col| actions.push(Interaction::SetPrimaryColumn(col)),
        );
    }

    if selection.chart.uses_secondary() {
        ui.add_space(4.0);
        ui.strong("Weather factor");
        column_combo(
            ui,
            "weather_factor",
            selection.secondary.as_deref(),
            &controller.weather_columns(),
            |col| actions.push(Interaction::SetSecondaryColumn(col)),
        );
    }

    if selection.chart.uses_bucket() {
        ui.add_space(4.0);
        ui.strong("Group by");
        egui::ComboBox::from_id_salt("bucket")
            .selected_text(selection.bucket.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for bucket in TimeBucket::ALL {
                    if ui
                        .selectable_label(selection.bucket == bucket, bucket.to_string())
                        .clicked()
                        && selection.bucket != bucket
                    {
                        actions.push(Interaction::SetBucket(bucket));
                    }
                }
            });
    }

    ui.add_space(8.0);
    let mut show_raw = selection.show_raw;
    if ui.checkbox(&mut show_raw, "Show raw data").changed() {
        actions.push(Interaction::ShowRawData(show_raw));
    }
}

fn column_combo(
    ui: &mut Ui,
    id: &str,
    current: Option<&str>,
    columns: &[String],
    mut on_pick: impl FnMut(String),
) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(current.unwrap_or("-"))
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for col in columns {
                let selected = current == Some(col.as_str());
                if ui.selectable_label(selected, col).clicked() && !selected {
                    on_pick(col.clone());
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, controller: &mut DashboardController) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(controller);
                ui.close_menu();
            }
            if ui
                .add_enabled(controller.view().is_some(), egui::Button::new("Export chart…"))
                .clicked()
            {
                export_chart_dialog(controller);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(ds), Some(view)) = (controller.dataset(), controller.view()) {
            ui.label(format!(
                "{}: {} rows loaded, {} visible",
                ds.name,
                ds.len(),
                view.filtered.len()
            ));
            if let Some(reason) = view.empty {
                ui.separator();
                ui.label(RichText::new(reason.message()).color(Color32::YELLOW));
            }
        }

        if let Some(msg) = controller.status_message() {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

/// Register a user-chosen file as a dataset and select it.
pub fn open_file_dialog(controller: &mut DashboardController) {
    let file = rfd::FileDialog::new()
        .set_title("Open air quality or weather data")
        .add_filter("Supported files", &["csv", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    let Some(path) = file else {
        return;
    };
    if !is_supported(&path) {
        controller.set_status(format!("Unsupported file: {}", path.display()));
        return;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("file/{file_name}");
    log::info!("Registering {} as '{name}'", path.display());
    controller.registry().register(name.clone(), DatasetSource::File(path));
    controller.handle(Interaction::SelectDataset(name));
}

/// Save the current chart description as pretty-printed JSON.
pub fn export_chart_dialog(controller: &mut DashboardController) {
    let Some(view) = controller.view() else {
        return;
    };
    let json = match view.chart.to_json() {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize chart: {e}");
            controller.set_status(format!("Error: {e}"));
            return;
        }
    };
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export chart")
        .set_file_name("chart.json")
        .add_filter("JSON", &["json"])
        .save_file()
    else {
        return;
    };
    match std::fs::write(&path, json) {
        Ok(()) => log::info!("Exported chart to {}", path.display()),
        Err(e) => {
            log::error!("Failed to write {}: {e}", path.display());
            controller.set_status(format!("Error: {e}"));
        }
    }
}
