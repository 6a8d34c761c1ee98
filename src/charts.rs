//! Server-side chart rendering to inline SVG.

use std::error::Error;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::stats::{Kde, LinearFit};

pub type ChartResult = Result<String, Box<dyn Error + Send + Sync>>;

pub const CHART_SIZE: (u32, u32) = (640, 480);

pub const HISTOGRAM_BINS: usize = 50;

/// Scatter plots keep at most this many points so the SVG stays small.
pub const MAX_SCATTER_POINTS: usize = 4000;

const KDE_POINTS: usize = 200;

/// Padding added around the data range on each axis (5% of span).
const AXIS_PADDING: f64 = 0.05;

fn padded_range(values: &[f64]) -> (f64, f64) {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let span = max - min;
    if span == 0.0 {
        return (min - 1.0, max + 1.0);
    }
    (min - span * AXIS_PADDING, max + span * AXIS_PADDING)
}

/// Every `stride`-th pair, so that at most `limit` points remain.
fn thin(xs: &[f64], ys: &[f64], limit: usize) -> Vec<(f64, f64)> {
    let n = xs.len().min(ys.len());
    let stride = n.div_ceil(limit.max(1)).max(1);
    (0..n).step_by(stride).map(|i| (xs[i], ys[i])).collect()
}

/// Histogram scaled to density with a Gaussian KDE drawn on top.
pub fn histogram_with_kde(values: &[f64], title: &str, x_label: &str) -> ChartResult {
    let (lo, hi) = padded_range(values);
    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = (((v - lo) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let total = values.len().max(1) as f64;
    let densities: Vec<f64> = counts.iter().map(|&c| c as f64 / (total * width)).collect();

    let kde_curve: Vec<(f64, f64)> = match Kde::new(values) {
        Some(kde) => (0..KDE_POINTS)
            .map(|i| {
                let x = lo + (hi - lo) * i as f64 / (KDE_POINTS - 1) as f64;
                (x, kde.density(x))
            })
            .collect(),
        None => Vec::new(),
    };

    let y_max = densities
        .iter()
        .copied()
        .chain(kde_curve.iter().map(|&(_, y)| y))
        .fold(0.0f64, f64::max)
        * 1.1;
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(lo..hi, 0.0..y_max)?;

        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc("Density")
            .draw()?;

        chart.draw_series(densities.iter().enumerate().map(|(i, &d)| {
            let x0 = lo + i as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, d)], BLUE.mix(0.4).filled())
        }))?;

        if !kde_curve.is_empty() {
            chart.draw_series(LineSeries::new(kde_curve, BLUE.stroke_width(2)))?;
        }

        root.present()?;
    }
    Ok(svg)
}

/// Scatter of `ys` against `xs`, optionally with a least-squares trend line.
pub fn scatter(
    xs: &[f64],
    ys: &[f64],
    title: &str,
    x_label: &str,
    y_label: &str,
    with_trend: bool,
) -> ChartResult {
    let (x_lo, x_hi) = padded_range(xs);
    let (y_lo, y_hi) = padded_range(ys);
    let points = thin(xs, ys, MAX_SCATTER_POINTS);
    let alpha = if with_trend { 0.3 } else { 0.5 };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(alpha).filled())),
        )?;

        if with_trend {
            if let Some(fit) = LinearFit::fit(xs, ys) {
                chart.draw_series(LineSeries::new(
                    [(x_lo, fit.at(x_lo)), (x_hi, fit.at(x_hi))],
                    RED.stroke_width(2),
                ))?;
            }
        }

        root.present()?;
    }
    Ok(svg)
}

/// Blue for -1, white for 0, red for +1.
fn coolwarm(v: f64) -> RGBColor {
    let t = if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    let blend = |from: (f64, f64, f64), to: (f64, f64, f64), k: f64| {
        RGBColor(
            (from.0 + (to.0 - from.0) * k).round() as u8,
            (from.1 + (to.1 - from.1) * k).round() as u8,
            (from.2 + (to.2 - from.2) * k).round() as u8,
        )
    };
    let white = (247.0, 247.0, 247.0);
    if t < 0.0 {
        blend(white, (59.0, 76.0, 192.0), -t)
    } else {
        blend(white, (180.0, 4.0, 38.0), t)
    }
}

/// Annotated correlation heatmap; `matrix[i][j]` is drawn at row i, column j.
pub fn correlation_heatmap(names: &[&str], matrix: &[Vec<f64>]) -> ChartResult {
    let n = names.len() as i32;
    let cell = 64;
    let label_margin = 90;
    let size = (
        (label_margin + cell * n + 20) as u32,
        (label_margin + cell * n + 20) as u32,
    );

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE)?;

        let centered = Pos::new(HPos::Center, VPos::Center);
        let label_style = TextStyle::from(("sans-serif", 12).into_font()).pos(centered);
        let row_label_style =
            TextStyle::from(("sans-serif", 12).into_font()).pos(Pos::new(HPos::Right, VPos::Center));

        for (j, name) in names.iter().enumerate() {
            let x = label_margin + cell * j as i32 + cell / 2;
            root.draw(&Text::new(name.to_string(), (x, label_margin - 15), label_style.clone()))?;
        }

        for (i, row) in matrix.iter().enumerate().take(names.len()) {
            let y = label_margin + cell * i as i32;
            root.draw(&Text::new(
                names[i].to_string(),
                (label_margin - 8, y + cell / 2),
                row_label_style.clone(),
            ))?;

            for (j, &value) in row.iter().enumerate().take(names.len()) {
                let x = label_margin + cell * j as i32;
                root.draw(&Rectangle::new(
                    [(x, y), (x + cell, y + cell)],
                    coolwarm(value).filled(),
                ))?;
                let text = if value.is_finite() {
                    format!("{:.2}", value)
                } else {
                    "n/a".to_string()
                };
                root.draw(&Text::new(
                    text,
                    (x + cell / 2, y + cell / 2),
                    label_style.clone(),
                ))?;
            }
        }

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_renders_svg() {
        let values: Vec<f64> = (0..500).map(|i| (i % 37) as f64 / 10.0).collect();
        let svg = histogram_with_kde(&values, "House value distribution", "target").unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("House value distribution"));
    }

    #[test]
    fn scatter_handles_constant_columns() {
        let xs = vec![1.0; 10];
        let ys: Vec<f64> = (0..10).map(f64::from).collect();
        let svg = scatter(&xs, &ys, "flat", "x", "y", true).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn heatmap_annotates_each_cell() {
        let names = ["a", "b"];
        let matrix = vec![vec![1.0, -0.25], vec![-0.25, 1.0]];
        let svg = correlation_heatmap(&names, &matrix).unwrap();
        assert_eq!(svg.matches("1.00").count(), 2);
        assert_eq!(svg.matches("-0.25").count(), 2);
    }

    #[test]
    fn thinning_caps_point_count() {
        let xs: Vec<f64> = (0..10_000).map(f64::from).collect();
        assert!(thin(&xs, &xs, 4000).len() <= 4000);
        assert_eq!(thin(&xs[..10], &xs[..10], 4000).len(), 10);
    }

    #[test]
    fn colormap_endpoints() {
        assert_eq!(coolwarm(-1.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.0), RGBColor(247, 247, 247));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
    }
}
