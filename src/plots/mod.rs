//! PNG rendering of evaluation charts.
//!
//! Charts are drawn directly onto an `RgbImage`: axes in a fixed plot area,
//! polylines for curves, filled rectangles for bars and cells, and a small
//! bitmap font for numbers.

mod charts;

pub use charts::{
    render_all, render_confusion_matrix, render_precision_recall, render_roc_curve, render_threshold_comparison,
    render_training_history, PlotInputs, CONFUSION_MATRIX_FILE, PRECISION_RECALL_FILE, ROC_CURVE_FILE,
    THRESHOLD_COMPARISON_FILE, TRAINING_HISTORY_FILE,
};

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("failed to write {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nothing to plot for {0}")]
    NoData(&'static str),
}

pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const GRID: Rgb<u8> = Rgb([225, 225, 225]);
    pub const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
    pub const GRAY: Rgb<u8> = Rgb([150, 150, 150]);
    pub const BLUE: Rgb<u8> = Rgb([33, 150, 243]);
    pub const DARK_BLUE: Rgb<u8> = Rgb([13, 71, 161]);
    pub const ORANGE: Rgb<u8> = Rgb([255, 152, 0]);
    pub const GREEN: Rgb<u8> = Rgb([0, 200, 83]);
    pub const RED: Rgb<u8> = Rgb([229, 57, 53]);
}

/// Linear blend of two colors, `t` clamped to [0, 1].
pub fn interpolate_color(c1: Rgb<u8>, c2: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| ((1.0 - t) * f64::from(a) + t * f64::from(b)).round() as u8;
    Rgb([mix(c1.0[0], c2.0[0]), mix(c1.0[1], c2.0[1]), mix(c1.0[2], c2.0[2])])
}

// ============================================================================
// Canvas
// ============================================================================

/// Data-space rectangle mapped onto a pixel-space plot area.
#[derive(Debug, Clone, Copy)]
pub struct Axes {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl Axes {
    /// Pixel coordinates of a data point (y grows upward in data space).
    pub fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let span = |r: (f64, f64)| if (r.1 - r.0).abs() < f64::EPSILON { 1.0 } else { r.1 - r.0 };
        let fx = (x - self.x_range.0) / span(self.x_range);
        let fy = (y - self.y_range.0) / span(self.y_range);
        let px = f64::from(self.left) + fx * f64::from(self.width);
        let py = f64::from(self.top) + (1.0 - fy) * f64::from(self.height);
        (px.round() as i64, py.round() as i64)
    }
}

pub struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { img: RgbImage::from_pixel(width, height, colors::WHITE) }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.img
    }

    /// Set a pixel, ignoring coordinates outside the image.
    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(self.img.width()) && y < i64::from(self.img.height()) {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
        for dy in 0..height {
            for dx in 0..width {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
        self.line((x, y), (x + width - 1, y), color, 1);
        self.line((x, y + height - 1), (x + width - 1, y + height - 1), color, 1);
        self.line((x, y), (x, y + height - 1), color, 1);
        self.line((x + width - 1, y), (x + width - 1, y + height - 1), color, 1);
    }

    /// Bresenham line; `thickness` widens it into a square brush.
    pub fn line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb<u8>, thickness: i64) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let half = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -half..=half {
                for oy in -half..=half {
                    self.put(x0 + ox, y0 + oy, color);
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Dashed line: alternating `dash` pixel runs on and off.
    pub fn dashed_line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb<u8>, dash: i64) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
        for i in 0..=steps {
            if (i / dash.max(1)) % 2 == 0 {
                let x = from.0 + (to.0 - from.0) * i / steps;
                let y = from.1 + (to.1 - from.1) * i / steps;
                self.put(x, y, color);
            }
        }
    }

    pub fn polyline(&mut self, axes: &Axes, points: &[(f64, f64)], color: Rgb<u8>, thickness: i64) {
        for pair in points.windows(2) {
            let a = axes.to_pixel(pair[0].0, pair[0].1);
            let b = axes.to_pixel(pair[1].0, pair[1].1);
            self.line(a, b, color, thickness);
        }
    }

    /// Frame, with grid lines every `1/divisions` of each axis.
    pub fn draw_axes(&mut self, axes: &Axes, divisions: u32) {
        let (l, t) = (i64::from(axes.left), i64::from(axes.top));
        let (w, h) = (i64::from(axes.width), i64::from(axes.height));
        let divisions = i64::from(divisions.max(1));
        for k in 1..divisions {
            let x = l + w * k / divisions;
            let y = t + h * k / divisions;
            self.line((x, t), (x, t + h), colors::GRID, 1);
            self.line((l, y), (l + w, y), colors::GRID, 1);
        }
        self.stroke_rect(l, t, w + 1, h + 1, colors::AXIS);
    }

    /// Draw `text` with its top-left corner at (x, y). Letters render in
    /// upper case; characters without a glyph leave a blank cell.
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: i64) {
        let mut cursor = x;
        for ch in text.chars() {
            if let Some(rows) = glyph(ch) {
                for (ry, bits) in rows.iter().enumerate() {
                    for rx in 0..GLYPH_WIDTH {
                        if bits & (1 << (GLYPH_WIDTH - 1 - rx)) != 0 {
                            self.fill_rect(cursor + rx * scale, y + ry as i64 * scale, scale, scale, color);
                        }
                    }
                }
            }
            cursor += (GLYPH_WIDTH + 1) * scale;
        }
    }

    /// Draw `text` top to bottom, one character per row, for y-axis names.
    pub fn text_vertical(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: i64) {
        let mut buf = [0_u8; 4];
        for (i, ch) in text.chars().enumerate() {
            let row = y + i as i64 * (GLYPH_HEIGHT + 1) * scale;
            self.text(x, row, ch.encode_utf8(&mut buf), color, scale);
        }
    }

    /// Color swatch followed by its label for each entry, laid out left to
    /// right from (x, y). Returns the x coordinate after the last entry.
    pub fn legend(&mut self, x: i64, y: i64, entries: &[(&str, Rgb<u8>)], scale: i64) -> i64 {
        let swatch = GLYPH_HEIGHT * scale;
        let mut cursor = x;
        for (label, color) in entries {
            self.fill_rect(cursor, y, swatch, swatch, *color);
            cursor += swatch + 2 * scale;
            self.text(cursor, y, label, colors::AXIS, scale);
            cursor += Self::text_width(label, scale) + 3 * GLYPH_WIDTH * scale;
        }
        cursor
    }

    /// Pixel width of `text` at `scale`.
    pub fn text_width(text: &str, scale: i64) -> i64 {
        let n = text.chars().count() as i64;
        (n * (GLYPH_WIDTH + 1) - 1).max(0) * scale
    }

    pub fn save(&self, path: &Path) -> Result<(), PlotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| PlotError::Io { path: parent.to_path_buf(), source })?;
        }
        self.img
            .save(path)
            .map_err(|source| PlotError::Image { path: path.to_path_buf(), source })
    }
}

// ============================================================================
// Bitmap font (3x5)
// ============================================================================

const GLYPH_WIDTH: i64 = 3;
pub(crate) const GLYPH_HEIGHT: i64 = 5;

fn glyph(ch: char) -> Option<[u8; 5]> {
    Some(match ch.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        ' ' => [0; 5],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_color() {
        let mid = interpolate_color(colors::BLACK, colors::WHITE, 0.5);
        assert_eq!(mid, Rgb([128, 128, 128]));
        assert_eq!(interpolate_color(colors::BLACK, colors::WHITE, 2.0), colors::WHITE);
    }

    #[test]
    fn test_axes_mapping() {
        let axes = Axes { left: 10, top: 20, width: 100, height: 50, x_range: (0.0, 1.0), y_range: (0.0, 1.0) };
        assert_eq!(axes.to_pixel(0.0, 0.0), (10, 70));
        assert_eq!(axes.to_pixel(1.0, 1.0), (110, 20));
    }

    #[test]
    fn test_line_endpoints_and_clipping() {
        let mut canvas = Canvas::new(20, 20);
        canvas.line((-5, 3), (25, 3), colors::RED, 1);
        assert_eq!(*canvas.image().get_pixel(0, 3), colors::RED);
        assert_eq!(*canvas.image().get_pixel(19, 3), colors::RED);
        canvas.line((2, 2), (9, 9), colors::BLUE, 1);
        assert_eq!(*canvas.image().get_pixel(5, 5), colors::BLUE);
    }

    #[test]
    fn test_text_draws_digits() {
        let mut canvas = Canvas::new(30, 10);
        canvas.text(0, 0, "10", colors::BLACK, 1);
        // '1' has its top row centre pixel set.
        assert_eq!(*canvas.image().get_pixel(1, 0), colors::BLACK);
        assert_eq!(Canvas::text_width("10", 2), 14);
    }

    #[test]
    fn test_letters_render_case_insensitively() {
        let mut upper = Canvas::new(12, 6);
        let mut lower = Canvas::new(12, 6);
        upper.text(0, 0, "AUC", colors::BLACK, 1);
        lower.text(0, 0, "auc", colors::BLACK, 1);
        assert_eq!(upper.image(), lower.image());
        // 'T' top row is solid.
        let mut t = Canvas::new(4, 6);
        t.text(0, 0, "T", colors::BLACK, 1);
        assert_eq!(*t.image().get_pixel(0, 0), colors::BLACK);
        assert_eq!(*t.image().get_pixel(2, 0), colors::BLACK);
        assert_eq!(*t.image().get_pixel(0, 1), colors::WHITE);
    }

    #[test]
    fn test_vertical_text_stacks_rows() {
        let mut canvas = Canvas::new(4, 12);
        canvas.text_vertical(0, 0, "11", colors::BLACK, 1);
        // Second '1' starts one glyph height plus a gap lower.
        assert_eq!(*canvas.image().get_pixel(1, 0), colors::BLACK);
        assert_eq!(*canvas.image().get_pixel(1, 6), colors::BLACK);
    }

    #[test]
    fn test_legend_draws_swatches() {
        let mut canvas = Canvas::new(120, 10);
        let end = canvas.legend(0, 0, &[("TRAIN", colors::BLUE), ("VAL", colors::ORANGE)], 1);
        assert_eq!(*canvas.image().get_pixel(0, 0), colors::BLUE);
        let second = 5 + 2 + Canvas::text_width("TRAIN", 1) + 9;
        assert_eq!(*canvas.image().get_pixel(second as u32, 0), colors::ORANGE);
        assert_eq!(end, second + 5 + 2 + Canvas::text_width("VAL", 1) + 9);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("sub").join("blank.png");
        Canvas::new(8, 8).save(&path).expect("save");
        assert!(path.exists());
    }
}
