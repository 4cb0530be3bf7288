//! The five evaluation charts.
//!
//! Every chart carries a title in the top margin and names its axes. Series
//! colors are explained by a legend wherever a chart has more than one.

use std::path::{Path, PathBuf};

use image::Rgb;

use super::{colors, interpolate_color, Axes, Canvas, PlotError, GLYPH_HEIGHT};
use crate::evaluation::{ConfusionMatrix, PrPoint, RocPoint, ThresholdMetrics};
use crate::model::TrainingHistory;

pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.png";
pub const ROC_CURVE_FILE: &str = "roc_curve.png";
pub const PRECISION_RECALL_FILE: &str = "precision_recall_curve.png";
pub const TRAINING_HISTORY_FILE: &str = "training_history.png";
pub const THRESHOLD_COMPARISON_FILE: &str = "threshold_comparison.png";

const SIZE: u32 = 480;
const MARGIN: u32 = 48;

fn square_axes() -> Axes {
    Axes {
        left: MARGIN,
        top: MARGIN / 2,
        width: SIZE - MARGIN - MARGIN / 2,
        height: SIZE - MARGIN - MARGIN / 2,
        x_range: (0.0, 1.0),
        y_range: (0.0, 1.0),
    }
}

const TITLE_Y: i64 = 7;

fn title(canvas: &mut Canvas, x: i64, text: &str) {
    canvas.text(x, TITLE_Y, text, colors::BLACK, 2);
}

/// Horizontal name under the x tick labels and vertical name left of the y
/// tick labels.
fn axis_names(canvas: &mut Canvas, axes: &Axes, x_name: &str, y_name: &str) {
    let (left, bottom) = axes.to_pixel(axes.x_range.0, axes.y_range.0);
    let center = left + i64::from(axes.width) / 2;
    canvas.text(center - Canvas::text_width(x_name, 2) / 2, bottom + 22, x_name, colors::AXIS, 2);

    let height = y_name.chars().count() as i64 * (GLYPH_HEIGHT + 1) * 2;
    let (_, top) = axes.to_pixel(axes.x_range.0, axes.y_range.1);
    let middle = (top + bottom) / 2;
    canvas.text_vertical(left - 44, middle - height / 2, y_name, colors::AXIS, 2);
}

/// Tick labels 0, 0.5 and 1 on both unit axes.
fn unit_ticks(canvas: &mut Canvas, axes: &Axes) {
    for (v, label) in [(0.0, "0"), (0.5, "0.5"), (1.0, "1")] {
        let (x, y) = axes.to_pixel(v, 0.0);
        canvas.text(x - Canvas::text_width(label, 2) / 2, y + 6, label, colors::AXIS, 2);
        let (x, y) = axes.to_pixel(0.0, v);
        canvas.text(x - Canvas::text_width(label, 2) - 6, y - 5, label, colors::AXIS, 2);
    }
}

/// 2x2 grid, rows = actual, columns = predicted, shaded by count.
pub fn render_confusion_matrix(cm: &ConfusionMatrix, path: &Path) -> Result<(), PlotError> {
    let mut canvas = Canvas::new(SIZE, SIZE);
    let grid = cm.as_grid();
    let max = grid.iter().flatten().copied().max().unwrap_or(0).max(1);
    let cell = i64::from((SIZE - 2 * MARGIN) / 2);
    let origin = i64::from(MARGIN);

    for (row, counts) in grid.iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let x = origin + col as i64 * cell;
            let y = origin + row as i64 * cell;
            let shade = interpolate_color(colors::WHITE, colors::DARK_BLUE, count as f64 / max as f64);
            canvas.fill_rect(x, y, cell, cell, shade);
            canvas.stroke_rect(x, y, cell, cell, colors::AXIS);

            let text_color = if count as f64 / max as f64 > 0.5 { colors::WHITE } else { colors::BLACK };
            let label = count.to_string();
            let scale = 4;
            canvas.text(
                x + (cell - Canvas::text_width(&label, scale)) / 2,
                y + (cell - 5 * scale) / 2,
                &label,
                text_color,
                scale,
            );
        }
    }

    // Axis class markers: 0 (normal) and 1 (failure).
    for k in 0..2_i64 {
        let label = k.to_string();
        canvas.text(origin + k * cell + cell / 2 - 3, origin + 2 * cell + 10, &label, colors::AXIS, 2);
        canvas.text(origin - 20, origin + k * cell + cell / 2 - 5, &label, colors::AXIS, 2);
    }

    title(&mut canvas, origin, "CONFUSION MATRIX (1 = FAILURE)");
    let predicted = "PREDICTED";
    let predicted_x = origin + cell - Canvas::text_width(predicted, 2) / 2;
    canvas.text(predicted_x, origin + 2 * cell + 26, predicted, colors::AXIS, 2);
    let actual = "ACTUAL";
    let height = actual.len() as i64 * (GLYPH_HEIGHT + 1) * 2;
    canvas.text_vertical(6, origin + cell - height / 2, actual, colors::AXIS, 2);

    canvas.save(path)
}

/// ROC polyline with the chance diagonal and the AUC printed in the corner.
pub fn render_roc_curve(points: &[RocPoint], auc: Option<f64>, path: &Path) -> Result<(), PlotError> {
    if points.is_empty() {
        return Err(PlotError::NoData("roc curve"));
    }
    let mut canvas = Canvas::new(SIZE, SIZE);
    let axes = square_axes();
    canvas.draw_axes(&axes, 4);
    unit_ticks(&mut canvas, &axes);

    canvas.dashed_line(axes.to_pixel(0.0, 0.0), axes.to_pixel(1.0, 1.0), colors::GRAY, 6);
    let xy: Vec<(f64, f64)> = points.iter().map(|p| (p.fpr, p.tpr)).collect();
    canvas.polyline(&axes, &xy, colors::BLUE, 3);

    title(&mut canvas, i64::from(axes.left), "ROC CURVE");
    axis_names(&mut canvas, &axes, "FALSE POSITIVE RATE", "TRUE POSITIVE RATE");
    if let Some(auc) = auc {
        let (x, y) = axes.to_pixel(0.55, 0.1);
        canvas.text(x, y, &format!("AUC {auc:.3}"), colors::DARK_BLUE, 3);
    }
    canvas.save(path)
}

/// Precision (y) against recall (x), with the positive prevalence line.
pub fn render_precision_recall(points: &[PrPoint], prevalence: f64, path: &Path) -> Result<(), PlotError> {
    if points.is_empty() {
        return Err(PlotError::NoData("precision-recall curve"));
    }
    let mut canvas = Canvas::new(SIZE, SIZE);
    let axes = square_axes();
    canvas.draw_axes(&axes, 4);
    unit_ticks(&mut canvas, &axes);

    canvas.dashed_line(axes.to_pixel(0.0, prevalence), axes.to_pixel(1.0, prevalence), colors::GRAY, 6);
    let xy: Vec<(f64, f64)> = points.iter().map(|p| (p.recall, p.precision)).collect();
    canvas.polyline(&axes, &xy, colors::ORANGE, 3);

    title(&mut canvas, i64::from(axes.left), "PRECISION-RECALL");
    axis_names(&mut canvas, &axes, "RECALL", "PRECISION");
    let (x, _) = axes.to_pixel(0.45, 0.0);
    canvas.legend(x, TITLE_Y, &[("MODEL", colors::ORANGE), ("PREVALENCE", colors::GRAY)], 2);
    canvas.save(path)
}

/// Two panels: loss (left) and ROC AUC (right), train in blue, validation in
/// orange, best epoch as a dashed green line, x = epoch.
pub fn render_training_history(history: &TrainingHistory, path: &Path) -> Result<(), PlotError> {
    if history.epochs.is_empty() {
        return Err(PlotError::NoData("training history"));
    }
    let width = 2 * SIZE;
    let mut canvas = Canvas::new(width, SIZE);
    let n = history.epochs.len() as f64;
    let x_range = (1.0, n.max(2.0));
    let panel = |left: u32, y_range: (f64, f64)| Axes {
        left,
        top: MARGIN / 2,
        width: SIZE - MARGIN - MARGIN / 2,
        height: SIZE - MARGIN - MARGIN / 2,
        x_range,
        y_range,
    };

    let max_loss = history
        .epochs
        .iter()
        .flat_map(|e| std::iter::once(e.train.loss).chain(e.validation.map(|v| v.loss)))
        .fold(0.0_f64, f64::max)
        .max(1e-6);
    let loss_axes = panel(MARGIN, (0.0, max_loss * 1.05));
    let auc_axes = panel(SIZE + MARGIN, (0.0, 1.0));
    canvas.draw_axes(&loss_axes, 4);
    canvas.draw_axes(&auc_axes, 4);
    unit_ticks(&mut canvas, &auc_axes);

    let series = |f: &dyn Fn(&crate::model::EpochMetrics) -> Option<f64>| -> Vec<(f64, f64)> {
        history
            .epochs
            .iter()
            .filter_map(|e| f(e).map(|v| (e.epoch as f64, v)))
            .collect()
    };

    canvas.polyline(&loss_axes, &series(&|e| Some(e.train.loss)), colors::BLUE, 2);
    canvas.polyline(&loss_axes, &series(&|e| e.validation.map(|v| v.loss)), colors::ORANGE, 2);
    canvas.polyline(&auc_axes, &series(&|e| e.train.auc), colors::BLUE, 2);
    canvas.polyline(&auc_axes, &series(&|e| e.validation.and_then(|v| v.auc)), colors::ORANGE, 2);

    if history.best_epoch > 0 {
        let best = history.best_epoch as f64;
        for axes in [&loss_axes, &auc_axes] {
            let top = axes.to_pixel(best, axes.y_range.1);
            let bottom = axes.to_pixel(best, axes.y_range.0);
            canvas.dashed_line(top, bottom, colors::GREEN, 4);
        }
    }

    title(&mut canvas, i64::from(loss_axes.left), "LOSS");
    title(&mut canvas, i64::from(auc_axes.left), "ROC AUC");
    axis_names(&mut canvas, &loss_axes, "EPOCH", "BCE");
    axis_names(&mut canvas, &auc_axes, "EPOCH", "AUC");
    canvas.legend(
        i64::from(auc_axes.left) + 100,
        TITLE_Y,
        &[("TRAIN", colors::BLUE), ("VALIDATION", colors::ORANGE), ("BEST", colors::GREEN)],
        2,
    );
    canvas.save(path)
}

/// Grouped bars per threshold: precision, recall, F1.
pub fn render_threshold_comparison(rows: &[ThresholdMetrics], path: &Path) -> Result<(), PlotError> {
    if rows.is_empty() {
        return Err(PlotError::NoData("threshold comparison"));
    }
    let width = SIZE + SIZE / 2;
    let mut canvas = Canvas::new(width, SIZE);
    let axes = Axes {
        left: MARGIN,
        top: MARGIN / 2,
        width: width - MARGIN - MARGIN / 2,
        height: SIZE - MARGIN - MARGIN / 2,
        x_range: (0.0, rows.len() as f64),
        y_range: (0.0, 1.0),
    };
    canvas.draw_axes(&axes, 4);

    let bar_colors: [Rgb<u8>; 3] = [colors::BLUE, colors::ORANGE, colors::GREEN];
    let group = f64::from(axes.width) / rows.len() as f64;
    let bar = (group * 0.8 / 3.0).floor() as i64;
    let (_, baseline) = axes.to_pixel(0.0, 0.0);

    for (g, m) in rows.iter().enumerate() {
        let group_left = f64::from(axes.left) + group * g as f64 + group * 0.1;
        for (b, (value, color)) in [m.precision, m.recall, m.f1].into_iter().zip(bar_colors).enumerate() {
            let (_, top) = axes.to_pixel(0.0, value.clamp(0.0, 1.0));
            let x = group_left.round() as i64 + b as i64 * bar;
            canvas.fill_rect(x, top, bar - 2, baseline - top, color);
        }
        let label = format!("{:.1}", m.threshold);
        let center = (f64::from(axes.left) + group * (g as f64 + 0.5)).round() as i64;
        canvas.text(center - Canvas::text_width(&label, 2) / 2, baseline + 8, &label, colors::AXIS, 2);
    }

    title(&mut canvas, i64::from(axes.left), "THRESHOLD COMPARISON");
    axis_names(&mut canvas, &axes, "DECISION THRESHOLD", "SCORE");
    canvas.legend(
        i64::from(axes.left) + 260,
        TITLE_Y,
        &[("PRECISION", colors::BLUE), ("RECALL", colors::ORANGE), ("F1", colors::GREEN)],
        2,
    );
    canvas.save(path)
}

/// Everything the chart set is drawn from.
pub struct PlotInputs<'a> {
    pub confusion: &'a ConfusionMatrix,
    pub roc: &'a [RocPoint],
    pub roc_auc: Option<f64>,
    pub pr: &'a [PrPoint],
    pub prevalence: f64,
    pub history: &'a TrainingHistory,
    pub sweep: &'a [ThresholdMetrics],
}

/// Render all five charts into `dir`. Each chart is attempted independently;
/// the result for each file is returned in a fixed order.
pub fn render_all(dir: &Path, inputs: &PlotInputs<'_>) -> Vec<(PathBuf, Result<(), PlotError>)> {
    let path = |file: &str| dir.join(file);
    vec![
        (path(CONFUSION_MATRIX_FILE), render_confusion_matrix(inputs.confusion, &path(CONFUSION_MATRIX_FILE))),
        (path(ROC_CURVE_FILE), render_roc_curve(inputs.roc, inputs.roc_auc, &path(ROC_CURVE_FILE))),
        (
            path(PRECISION_RECALL_FILE),
            render_precision_recall(inputs.pr, inputs.prevalence, &path(PRECISION_RECALL_FILE)),
        ),
        (path(TRAINING_HISTORY_FILE), render_training_history(inputs.history, &path(TRAINING_HISTORY_FILE))),
        (
            path(THRESHOLD_COMPARISON_FILE),
            render_threshold_comparison(inputs.sweep, &path(THRESHOLD_COMPARISON_FILE)),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{precision_recall_curve, roc_curve, threshold_sweep};
    use crate::model::{EpochMetrics, SplitMetrics};

    fn history() -> TrainingHistory {
        let metrics = |loss: f64| SplitMetrics { loss, accuracy: 0.9, precision: 0.8, recall: 0.7, auc: Some(0.85) };
        TrainingHistory {
            epochs: (1..=5)
                .map(|epoch| EpochMetrics {
                    epoch,
                    learning_rate: 1e-3,
                    train: metrics(1.0 / epoch as f64),
                    validation: Some(metrics(1.2 / epoch as f64)),
                })
                .collect(),
            best_epoch: 5,
            stopped_early: false,
        }
    }

    #[test]
    fn test_render_all_writes_five_pngs() {
        let probs = [0.9, 0.8, 0.3, 0.6, 0.2, 0.1];
        let labels = [1, 1, 1, 0, 0, 0];
        let cm = ConfusionMatrix::at_threshold(&probs, &labels, 0.5);
        let roc = roc_curve(&probs, &labels);
        let pr = precision_recall_curve(&probs, &labels);
        let sweep = threshold_sweep(&probs, &labels);
        let history = history();

        let dir = tempfile::tempdir().expect("tmpdir");
        let inputs = PlotInputs {
            confusion: &cm,
            roc: &roc,
            roc_auc: Some(0.89),
            pr: &pr,
            prevalence: 0.5,
            history: &history,
            sweep: &sweep,
        };
        let results = render_all(dir.path(), &inputs);
        assert_eq!(results.len(), 5);
        for (path, result) in &results {
            assert!(result.is_ok(), "{}: {result:?}", path.display());
            assert!(path.exists());
        }
    }

    #[test]
    fn test_empty_inputs_are_errors_not_panics() {
        let dir = tempfile::tempdir().expect("tmpdir");
        assert!(matches!(
            render_roc_curve(&[], None, &dir.path().join("roc.png")),
            Err(PlotError::NoData(_))
        ));
        assert!(render_training_history(&TrainingHistory::default(), &dir.path().join("h.png")).is_err());
    }

    /// True when some pixel in rows `y0..y1` is darker than the grid color.
    fn has_ink(path: &Path, y0: u32, y1: u32) -> bool {
        let img = image::open(path).expect("decode png").to_rgb8();
        (y0..y1).any(|y| (0..img.width()).any(|x| img.get_pixel(x, y).0.iter().all(|&c| c < 200)))
    }

    #[test]
    fn test_charts_carry_titles_and_axis_names() {
        let probs = [0.9, 0.8, 0.3, 0.6, 0.2, 0.1];
        let labels = [1, 1, 1, 0, 0, 0];
        let dir = tempfile::tempdir().expect("tmpdir");

        let roc_path = dir.path().join(ROC_CURVE_FILE);
        render_roc_curve(&roc_curve(&probs, &labels), Some(0.9), &roc_path).expect("roc");
        let history_path = dir.path().join(TRAINING_HISTORY_FILE);
        render_training_history(&history(), &history_path).expect("history");

        let title_rows = (TITLE_Y as u32, TITLE_Y as u32 + 10);
        for path in [&roc_path, &history_path] {
            assert!(has_ink(path, title_rows.0, title_rows.1), "no title in {}", path.display());
            // x-axis name sits below the tick labels, in the bottom margin.
            assert!(has_ink(path, SIZE - 26, SIZE - 16), "no axis name in {}", path.display());
        }

        // Legend swatches share the title row of the AUC panel.
        let img = image::open(&history_path).expect("decode png").to_rgb8();
        let legend_x = SIZE + MARGIN + 100;
        assert_eq!(*img.get_pixel(legend_x + 1, TITLE_Y as u32 + 1), colors::BLUE);
    }

    #[test]
    fn test_confusion_matrix_with_zero_counts() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join(CONFUSION_MATRIX_FILE);
        render_confusion_matrix(&ConfusionMatrix::default(), &path).expect("render");
        assert!(path.exists());
    }
}
