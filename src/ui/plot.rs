use std::ops::RangeInclusive;

use airq_dashboard::chart::{
    date_from_days, Axis, AxisScale, Bar, ChartBody, ChartSpec, Heatmap, MarkStyle, Series,
};
use airq_dashboard::color::Rgb;
use airq_dashboard::state::View;
use eframe::egui::{self, Color32, RichText, Stroke, Ui};
use egui_plot::{
    BarChart, GridMark, Legend, Line, LineStyle, Plot, PlotPoint, PlotPoints, Points, Polygon,
    Text,
};

fn color32(c: Rgb) -> Color32 {
    let [r, g, b] = c.0;
    Color32::from_rgb(r, g, b)
}

// ---------------------------------------------------------------------------
// Chart view (central panel)
// ---------------------------------------------------------------------------

/// Render the current chart in the central panel.
pub fn chart_view(ui: &mut Ui, view: Option<&View>) {
    let Some(view) = view else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Select a dataset to begin  (File → Open…)");
        });
        return;
    };
    let spec = &view.chart;
    ui.heading(&spec.title);
    if let Some(note) = &spec.note {
        ui.label(RichText::new(note).weak());
    }
    let height = ui.available_height();
    draw_chart(ui, spec, "chart", height);
}

fn draw_chart(ui: &mut Ui, spec: &ChartSpec, id: &str, height: f32) {
    match &spec.body {
        ChartBody::NoData { message } => {
            ui.allocate_ui(egui::vec2(ui.available_width(), height), |ui: &mut Ui| {
                ui.centered_and_justified(|ui: &mut Ui| {
                    ui.heading(RichText::new(message).weak());
                });
            });
        }
        ChartBody::Series(series) => series_plot(ui, spec, series, id, height),
        ChartBody::Bars(bars) => bar_plot(ui, spec, bars, id, height),
        ChartBody::Heatmap(heatmap) => heatmap_plot(ui, heatmap, id, height),
        ChartBody::Panels(panels) => {
            let spacing = ui.spacing().item_spacing.y;
            let count = panels.len().max(1) as f32;
            let each = ((height - spacing * count) / count).max(80.0);
            for (i, panel) in panels.iter().enumerate() {
                ui.label(RichText::new(&panel.title).strong());
                draw_chart(ui, panel, &format!("{id}_{i}"), each - 18.0);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Axis formatting
// ---------------------------------------------------------------------------

type AxisFormatter = Box<dyn Fn(GridMark, &RangeInclusive<f64>) -> String>;

/// Tick labels for an axis; `None` keeps egui_plot's numeric default.
/// Category axes label integer positions only; `reversed` counts from the top.
fn axis_formatter(axis: &Axis, reversed: bool) -> Option<AxisFormatter> {
    match &axis.scale {
        AxisScale::Numeric => None,
        AxisScale::Days => Some(Box::new(|mark: GridMark, _range: &RangeInclusive<f64>| {
            date_from_days(mark.value)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })),
        AxisScale::Categories(labels) => {
            let labels = labels.clone();
            Some(Box::new(move |mark: GridMark, _range: &RangeInclusive<f64>| {
                let pos = mark.value.round();
                if (mark.value - pos).abs() > 1e-6 || pos < 0.0 {
                    return String::new();
                }
                let pos = pos as usize;
                let idx = if reversed {
                    labels.len().checked_sub(pos + 1)
                } else {
                    Some(pos)
                };
                idx.and_then(|i| labels.get(i)).cloned().unwrap_or_default()
            }))
        }
    }
}

fn base_plot<'a>(spec: &ChartSpec, id: &str, height: f32) -> Plot<'a> {
    let mut plot = Plot::new(id.to_string())
        .height(height)
        .x_axis_label(spec.x_axis.label.clone())
        .y_axis_label(spec.y_axis.label.clone())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if let Some(fmt) = axis_formatter(&spec.x_axis, false) {
        plot = plot.x_axis_formatter(fmt);
    }
    if let Some(fmt) = axis_formatter(&spec.y_axis, false) {
        plot = plot.y_axis_formatter(fmt);
    }
    if spec.x_axis.scale == AxisScale::Days {
        plot = plot.label_formatter(|name, value| {
            let date = date_from_days(value.x)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            if name.is_empty() {
                format!("{date}\n{:.2}", value.y)
            } else {
                format!("{name}\n{date}\n{:.2}", value.y)
            }
        });
    }
    plot
}

// ---------------------------------------------------------------------------
// Lines and points
// ---------------------------------------------------------------------------

fn series_plot(ui: &mut Ui, spec: &ChartSpec, series: &[Series], id: &str, height: f32) {
    base_plot(spec, id, height)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for s in series {
                let points: PlotPoints = s.points.iter().copied().collect();
                let color = color32(s.color);
                match s.style {
                    MarkStyle::Line => {
                        plot_ui.line(Line::new(points).name(&s.name).color(color).width(1.5));
                    }
                    MarkStyle::DashedLine => {
                        plot_ui.line(
                            Line::new(points)
                                .name(&s.name)
                                .color(color)
                                .width(1.5)
                                .style(LineStyle::dashed_loose()),
                        );
                    }
                    MarkStyle::Points => {
                        plot_ui.points(
                            Points::new(points).name(&s.name).color(color).radius(2.5),
                        );
                    }
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Bars with whiskers
// ---------------------------------------------------------------------------

fn bar_plot(ui: &mut Ui, spec: &ChartSpec, bars: &[Bar], id: &str, height: f32) {
    base_plot(spec, id, height).show(ui, |plot_ui| {
        let chart_bars: Vec<egui_plot::Bar> = bars
            .iter()
            .map(|b| {
                egui_plot::Bar::new(b.index as f64, b.value)
                    .name(&b.label)
                    .fill(color32(b.color))
                    .width(0.6)
            })
            .collect();
        plot_ui.bar_chart(BarChart::new(chart_bars));

        for b in bars {
            let Some(w) = b.whisker else { continue };
            let x = b.index as f64;
            let whisker: PlotPoints = vec![[x, b.value - w], [x, b.value + w]].into();
            plot_ui.line(Line::new(whisker).color(Color32::DARK_GRAY).width(1.5));
            for y in [b.value - w, b.value + w] {
                let cap: PlotPoints = vec![[x - 0.1, y], [x + 0.1, y]].into();
                plot_ui.line(Line::new(cap).color(Color32::DARK_GRAY).width(1.5));
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Annotated heatmap
// ---------------------------------------------------------------------------

fn heatmap_plot(ui: &mut Ui, heatmap: &Heatmap, id: &str, height: f32) {
    let n = heatmap.labels.len();
    let axis = Axis {
        label: String::new(),
        scale: AxisScale::Categories(heatmap.labels.clone()),
    };
    let mut plot = Plot::new(id.to_string())
        .height(height)
        .data_aspect(1.0)
        .show_grid(false)
        .allow_drag(false)
        .allow_scroll(false)
        .show_x(false)
        .show_y(false);
    if let Some(fmt) = axis_formatter(&axis, false) {
        plot = plot.x_axis_formatter(fmt);
    }
    if let Some(fmt) = axis_formatter(&axis, true) {
        plot = plot.y_axis_formatter(fmt);
    }

    plot.show(ui, |plot_ui| {
        for (i, row) in heatmap.values.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                let x = j as f64;
                let y = (n - 1 - i) as f64;
                let fill = color32(heatmap.colors[i][j]);
                let square: PlotPoints = vec![
                    [x - 0.5, y - 0.5],
                    [x + 0.5, y - 0.5],
                    [x + 0.5, y + 0.5],
                    [x - 0.5, y + 0.5],
                ]
                .into();
                plot_ui.polygon(
                    Polygon::new(square)
                        .fill_color(fill)
                        .stroke(Stroke::new(1.0, Color32::WHITE)),
                );
                let label = value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
                let text_color = if value.is_some_and(|v| v.abs() > 0.6) {
                    Color32::WHITE
                } else {
                    Color32::BLACK
                };
                plot_ui.text(Text::new(
                    PlotPoint::new(x, y),
                    RichText::new(label).color(text_color),
                ));
            }
        }
    });
}
