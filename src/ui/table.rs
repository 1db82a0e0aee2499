use airq_dashboard::data::model::Table;
use eframe::egui::{Align, Layout, Ui};
use egui_extras::{Column, TableBuilder};

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Raw data table (bottom panel)
// ---------------------------------------------------------------------------

/// Render every row of `table`; only the visible rows are laid out.
pub fn raw_table(ui: &mut Ui, table: &Table) {
    let schema = table.schema();
    if table.is_empty() {
        ui.label("No rows match the current filters.");
        return;
    }

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(Layout::left_to_right(Align::Center))
        .columns(Column::auto().at_least(64.0), schema.len())
        .min_scrolled_height(0.0)
        .header(ROW_HEIGHT + 2.0, |mut header| {
            for column in schema.columns() {
                header.col(|ui| {
                    ui.strong(&column.name);
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, table.len(), |mut row| {
                let record = &table.rows()[row.index()];
                for cell in &record.cells {
                    row.col(|ui| {
                        ui.label(cell.to_string());
                    });
                }
            });
        });
}
