//! Four-panel SVG line plots of sampled waveforms.
//!
//! Each figure is one row of panels: real and imaginary parts of the x
//! component, then of the y component. A comparison figure overlays a
//! second waveform as a dashed red line on top of the solid blue first one.

use std::ops::Range;
use std::path::Path;

use asymup_core::types::{Waveform, YGrid};
use plotters::prelude::*;

pub const PANEL_TITLES: [&str; 4] = ["real x pol", "imag x pol", "real y pol", "imag y pol"];

const DASH: usize = 6;
const GAP: usize = 4;

/// The four plotted series: Re x, Im x, Re y, Im y.
pub fn panels(wave: &Waveform) -> [Vec<f64>; 4] {
    [
        wave.x().iter().map(|v| v.re).collect(),
        wave.x().iter().map(|v| v.im).collect(),
        wave.y().iter().map(|v| v.re).collect(),
        wave.y().iter().map(|v| v.im).collect(),
    ]
}

/// Index ranges of the visible segments of a dashed line over `n` samples.
pub fn dash_runs(n: usize, dash: usize, gap: usize) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    if dash == 0 {
        return runs;
    }
    let mut start = 0;
    while start + 1 < n {
        // Segments share their end point with the next sample, so a dash of
        // `dash` steps covers `dash + 1` samples.
        let end = (start + dash + 1).min(n);
        runs.push(start..end);
        start += dash + gap;
    }
    runs
}

/// Axis range covering `values`, padded so flat series stay visible.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return -1.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(1e-12 * lo.abs().max(hi.abs())).max(1e-12);
    (lo - pad)..(hi + pad)
}

fn draw_panels(
    path: &Path,
    size: (u32, u32),
    title: &str,
    grid: &YGrid,
    first: &Waveform,
    second: Option<&Waveform>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 20))?;

    let ys = grid.points().to_vec();
    let solid = panels(first);
    let dashed = second.map(panels);

    for (idx, area) in root.split_evenly((1, 4)).iter().enumerate() {
        let range = match &dashed {
            Some(d) => value_range(solid[idx].iter().chain(d[idx].iter()).cloned()),
            None => value_range(solid[idx].iter().cloned()),
        };

        let mut chart = ChartBuilder::on(area)
            .caption(PANEL_TITLES[idx], ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..grid.ymax(), range)?;

        chart.configure_mesh().x_desc("y").draw()?;

        chart.draw_series(LineSeries::new(
            ys.iter().cloned().zip(solid[idx].iter().cloned()),
            &BLUE,
        ))?;

        if let Some(d) = &dashed {
            let segments = dash_runs(ys.len(), DASH, GAP).into_iter().map(|run| {
                let points: Vec<(f64, f64)> = run.map(|i| (ys[i], d[idx][i])).collect();
                PathElement::new(points, RED.stroke_width(2))
            });
            chart.draw_series(segments)?;
        }
    }

    root.present()?;
    Ok(())
}

/// Plot one waveform.
pub fn plot_waveform(
    path: &Path,
    size: (u32, u32),
    title: &str,
    grid: &YGrid,
    wave: &Waveform,
) -> Result<(), Box<dyn std::error::Error>> {
    draw_panels(path, size, title, grid, wave, None)
}

/// Plot `first` solid with `second` dashed on top.
pub fn plot_waveform_comparison(
    path: &Path,
    size: (u32, u32),
    title: &str,
    grid: &YGrid,
    first: &Waveform,
    second: &Waveform,
) -> Result<(), Box<dyn std::error::Error>> {
    draw_panels(path, size, title, grid, first, Some(second))
}
