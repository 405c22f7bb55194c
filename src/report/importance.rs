//! Feature importance export: CSV table and SVG bar chart

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::prelude::*;
use polars::prelude::*;

use crate::model::FeatureImportance;

pub const IMPORTANCE_CSV: &str = "feature_importance.csv";
pub const IMPORTANCE_SVG: &str = "feature_importance.svg";

/// Bars drawn in the chart
pub const DEFAULT_TOP_N: usize = 20;

const CHART_WIDTH: u32 = 900;
const BAR_HEIGHT: u32 = 24;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 20;
const LABEL_WIDTH: u32 = 260;
const VALUE_WIDTH: u32 = 90;

const BAR_COLOR: RGBColor = RGBColor(46, 134, 193);

/// Paths of the two report files written next to `artifact_path`.
pub fn report_paths(artifact_path: &Path) -> (PathBuf, PathBuf) {
    let dir = artifact_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    (dir.join(IMPORTANCE_CSV), dir.join(IMPORTANCE_SVG))
}

/// `feature, importance, share` table in the order given (callers pass
/// rows ranked by importance).
pub fn importance_frame(rows: &[FeatureImportance]) -> Result<DataFrame> {
    let features: Vec<&str> = rows.iter().map(|r| r.feature.as_str()).collect();
    let importance: Vec<f64> = rows.iter().map(|r| r.importance).collect();
    let shares: Vec<f64> = rows.iter().map(|r| r.share).collect();

    DataFrame::new(vec![
        Column::new("feature".into(), features),
        Column::new("importance".into(), importance),
        Column::new("share".into(), shares),
    ])
    .context("Failed to build feature importance table")
}

pub fn write_importance_csv(rows: &[FeatureImportance], path: &Path) -> Result<()> {
    let mut df = importance_frame(rows)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    Ok(())
}

/// Horizontal bar chart of the `top_n` most important features.
pub fn write_importance_svg(rows: &[FeatureImportance], path: &Path, top_n: usize) -> Result<()> {
    let shown: Vec<&FeatureImportance> = rows.iter().take(top_n.max(1)).collect();
    let height = MARGIN_TOP + MARGIN_BOTTOM + BAR_HEIGHT * shown.len().max(1) as u32;
    let max_importance = shown.iter().map(|r| r.importance).fold(0.0, f64::max);
    let bar_span = (CHART_WIDTH - LABEL_WIDTH - VALUE_WIDTH) as f64;

    let root = SVGBackend::new(path, (CHART_WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let title_font = ("sans-serif", 20).into_font();
    let label_font = ("sans-serif", 13).into_font();

    root.draw(&Text::new(
        "Feature importance (logloss increase when shuffled)",
        (10, 15),
        title_font,
    ))?;

    for (i, row) in shown.iter().enumerate() {
        let top = (MARGIN_TOP + BAR_HEIGHT * i as u32) as i32;
        let width = if max_importance > 0.0 {
            (bar_span * row.importance.max(0.0) / max_importance).round() as i32
        } else {
            0
        };
        let left = LABEL_WIDTH as i32;

        root.draw(&Text::new(
            row.feature.clone(),
            (10, top + 5),
            label_font.clone(),
        ))?;
        root.draw(&Rectangle::new(
            [(left, top + 3), (left + width.max(1), top + BAR_HEIGHT as i32 - 3)],
            BAR_COLOR.filled(),
        ))?;
        root.draw(&Text::new(
            format!("{:.4}", row.importance),
            (left + width + 6, top + 5),
            label_font.clone(),
        ))?;
    }

    root.present()
        .with_context(|| format!("Failed to write SVG file: {}", path.display()))?;
    Ok(())
}

/// Write both report files next to the artifact and return their paths.
pub fn write_importance_report(
    rows: &[FeatureImportance],
    artifact_path: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let (csv_path, svg_path) = report_paths(artifact_path);
    write_importance_csv(rows, &csv_path)?;
    write_importance_svg(rows, &svg_path, DEFAULT_TOP_N)?;
    tracing::debug!(csv = %csv_path.display(), svg = %svg_path.display(), "Importance report written");
    Ok((csv_path, svg_path))
}
