//! Chart rendering.
//!
//! Draws the four comparative charts of the analysis as SVG images: the two
//! error-bar response charts, the survival-rate chart, and the percent
//! tumor-change bar summary. Marker shapes are picked at random per series,
//! a cosmetic carry-over from the source analysis.

use crate::aggregate::{DrugChange, ResponseTable};
use log::info;
use plotters::prelude::*;
use plotters::style::FontTransform;
use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to render chart '{title}': {message}")]
    Render { title: String, message: String },
    #[error("no drawable data for chart '{0}'")]
    EmptyChart(String),
}

const CHART_SIZE: (u32, u32) = (1280, 800);

/// Okabe-Ito palette plus two fillers, one color per treatment series.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0, 114, 178),
    RGBColor(230, 159, 0),
    RGBColor(0, 158, 115),
    RGBColor(213, 94, 0),
    RGBColor(86, 180, 233),
    RGBColor(204, 121, 167),
    RGBColor(240, 228, 66),
    RGBColor(0, 0, 0),
    RGBColor(128, 128, 128),
    RGBColor(128, 0, 128),
];

#[derive(Debug, Clone, Copy)]
enum MarkerKind {
    Circle,
    Cross,
    Triangle,
}

const MARKERS: [MarkerKind; 3] = [MarkerKind::Circle, MarkerKind::Cross, MarkerKind::Triangle];

/// Mean tumor volume over time with SEM error bars, one series per drug.
pub fn tumor_response(
    mean: &ResponseTable,
    sem: &ResponseTable,
    path: &Path,
) -> Result<(), ChartError> {
    series_chart(
        "Tumor Response to Treatment",
        "Time (Days)",
        "Tumor Volume (mm3)",
        mean,
        Some(sem),
        None,
        SeriesLabelPosition::UpperLeft,
        path,
    )
}

/// Mean metastatic site count over time with SEM error bars.
pub fn metastatic_spread(
    mean: &ResponseTable,
    sem: &ResponseTable,
    path: &Path,
) -> Result<(), ChartError> {
    series_chart(
        "Metastatic Spread During Treatment",
        "Treatment Duration (Days)",
        "Metastatic Sites",
        mean,
        Some(sem),
        None,
        SeriesLabelPosition::UpperLeft,
        path,
    )
}

/// Surviving subject percentage over time.
pub fn survival_rate(percentages: &ResponseTable, path: &Path) -> Result<(), ChartError> {
    series_chart(
        "Survival During Treatment",
        "Time (Days)",
        "Survival Rate (%)",
        percentages,
        None,
        Some((0.0, 110.0)),
        SeriesLabelPosition::LowerLeft,
        path,
    )
}

/// Percent tumor-volume change over the treatment window, one bar per drug.
/// Shrinking tumors are drawn green, growing ones red.
pub fn tumor_change(changes: &[DrugChange], path: &Path) -> Result<(), ChartError> {
    let title = "Tumor Volume Change Over Treatment";
    if changes.is_empty() {
        return Err(ChartError::EmptyChart(title.to_string()));
    }

    let lo = changes.iter().map(|c| c.percent).fold(0.0f64, f64::min);
    let hi = changes.iter().map(|c| c.percent).fold(0.0f64, f64::max);
    let (y_lo, y_hi) = padded_range(lo, hi, 0.15);
    let n = changes.len() as f64;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(title, e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(120)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.6f64..n - 0.4, y_lo..y_hi)
        .map_err(|e| render_err(title, e))?;

    let drug_names: Vec<String> = changes.iter().map(|c| c.drug.clone()).collect();
    let x_label_style = TextStyle::from(("sans-serif", 14)).transform(FontTransform::Rotate270);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(changes.len())
        .x_label_style(x_label_style)
        .x_label_formatter(&|value: &f64| {
            let idx = value.round() as usize;
            if (value - idx as f64).abs() < 1e-6 && idx < drug_names.len() {
                drug_names[idx].clone()
            } else {
                String::new()
            }
        })
        .y_desc("% Tumor Volume Change")
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| render_err(title, e))?;

    for (i, change) in changes.iter().enumerate() {
        let color = if change.percent < 0.0 { GREEN } else { RED };
        let x = i as f64;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - 0.35, 0.0), (x + 0.35, change.percent)],
                color.filled(),
            )))
            .map_err(|e| render_err(title, e))?;

        let label_offset = (y_hi - y_lo) * 0.02;
        let label_y = if change.percent < 0.0 {
            change.percent - label_offset
        } else {
            change.percent + label_offset
        };
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{:.1}%", change.percent),
                (x - 0.2, label_y),
                ("sans-serif", 14),
            )))
            .map_err(|e| render_err(title, e))?;
    }

    // Zero baseline, so small positive bars remain readable.
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(-0.6, 0.0), (n - 0.4, 0.0)],
            BLACK.stroke_width(1),
        )))
        .map_err(|e| render_err(title, e))?;

    root.present().map_err(|e| render_err(title, e))?;
    info!("wrote chart '{}' to '{}'", title, path.display());
    Ok(())
}

/// Shared line-chart body: one series per drug, optional SEM error bars,
/// optional fixed y-range.
#[allow(clippy::too_many_arguments)]
fn series_chart(
    title: &str,
    x_desc: &str,
    y_desc: &str,
    table: &ResponseTable,
    sem: Option<&ResponseTable>,
    y_range: Option<(f64, f64)>,
    legend: SeriesLabelPosition,
    path: &Path,
) -> Result<(), ChartError> {
    let mut x_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    for d in 0..table.drugs.len() {
        for (t, &time) in table.timepoints.iter().enumerate() {
            let value = table.get(t, d);
            if !value.is_finite() {
                continue;
            }
            let spread = sem
                .map(|s| s.get(t, d))
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);
            x_bounds = (x_bounds.0.min(time), x_bounds.1.max(time));
            y_bounds = (y_bounds.0.min(value - spread), y_bounds.1.max(value + spread));
        }
    }
    if !x_bounds.0.is_finite() || !y_bounds.0.is_finite() {
        return Err(ChartError::EmptyChart(title.to_string()));
    }

    let (x_lo, x_hi) = padded_range(x_bounds.0, x_bounds.1, 0.05);
    let (y_lo, y_hi) = match y_range {
        Some(range) => range,
        None => padded_range(y_bounds.0, y_bounds.1, 0.05),
    };

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(title, e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(|e| render_err(title, e))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| render_err(title, e))?;

    let mut rng = rand::thread_rng();
    for (d, drug) in table.drugs.iter().enumerate() {
        let points = table.series(d);
        if points.is_empty() {
            continue;
        }
        let color = PALETTE[d % PALETTE.len()];
        let marker = MARKERS
            .choose(&mut rng)
            .copied()
            .unwrap_or(MarkerKind::Circle);

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(1)))
            .map_err(|e| render_err(title, e))?
            .label(drug.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));

        if let Some(sem) = sem {
            for (t_idx, &time) in table.timepoints.iter().enumerate() {
                let value = table.get(t_idx, d);
                let spread = sem.get(t_idx, d);
                if !value.is_finite() || !spread.is_finite() {
                    continue;
                }
                chart
                    .draw_series(std::iter::once(ErrorBar::new_vertical(
                        time,
                        value - spread,
                        value,
                        value + spread,
                        color.stroke_width(1),
                        8,
                    )))
                    .map_err(|e| render_err(title, e))?;
            }
        }

        for &(x, y) in &points {
            let element = match marker {
                MarkerKind::Circle => Circle::new((x, y), 4, color.filled()).into_dyn(),
                MarkerKind::Cross => Cross::new((x, y), 4, color.stroke_width(2)).into_dyn(),
                MarkerKind::Triangle => TriangleMarker::new((x, y), 5, color.filled()).into_dyn(),
            };
            chart
                .draw_series(std::iter::once(element))
                .map_err(|e| render_err(title, e))?;
        }
    }

    chart
        .configure_series_labels()
        .position(legend)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .label_font(("sans-serif", 16))
        .draw()
        .map_err(|e| render_err(title, e))?;

    root.present().map_err(|e| render_err(title, e))?;
    info!("wrote chart '{}' to '{}'", title, path.display());
    Ok(())
}

/// Expands a closed range by `pct` on both sides so points stay off the
/// border; degenerate ranges get a unit pad.
fn padded_range(min_value: f64, max_value: f64, pct: f64) -> (f64, f64) {
    if (max_value - min_value).abs() < 1e-9 {
        return (min_value - 1.0, max_value + 1.0);
    }
    let pad = (max_value - min_value) * pct;
    (min_value - pad, max_value + pad)
}

/// Plotters error types are generic over the backend, so they are carried as
/// rendered strings.
fn render_err<E: std::fmt::Display>(title: &str, err: E) -> ChartError {
    ChartError::Render {
        title: title.to_string(),
        message: err.to_string(),
    }
}
