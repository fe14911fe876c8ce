//! Spectrum panel: magnitude trace over a frequency/dB grid.

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke};

/// Displayed dB range; magnitudes are clamped into it.
pub const MIN_DB: f32 = -40.0;
pub const MAX_DB: f32 = 60.0;
const DB_GRID_STEP: i32 = 20;

/// Spacing of the vertical frequency grid lines, in Hz.
const FREQ_GRID_STEP: u32 = 500_000;

const LABEL_MARGIN: f32 = 5.0;

/// Draw the magnitude spectrum into `rect`.
///
/// `magnitudes` holds `fft_n` values in dB, bin 0 at `center - rate/2`,
/// the middle bin at the center frequency.
pub fn draw(
    painter: &Painter,
    rect: Rect,
    magnitudes: &[f32],
    center_freq_hz: u32,
    sample_rate_hz: u32,
) {
    if magnitudes.len() < 2 || sample_rate_hz == 0 {
        return;
    }

    let grid_stroke = Stroke::new(1.0, Color32::LIGHT_GRAY);
    let label_font = FontId::proportional(10.0);

    // Vertical grid: one line per FREQ_GRID_STEP across the tuned span.
    let span_start = center_freq_hz.saturating_sub(sample_rate_hz / 2);
    let span_end = center_freq_hz + sample_rate_hz / 2;
    let mut freq = grid_start(span_start, FREQ_GRID_STEP);
    while freq <= span_end {
        let x = freq_to_x(freq, center_freq_hz, sample_rate_hz, rect);
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            grid_stroke,
        );

        let label = format!("{:.2}", freq as f64 / 1e6);
        let galley = painter.layout_no_wrap(label, label_font.clone(), Color32::DARK_GRAY);
        let label_x = clamp_label_x(x - galley.size().x / 2.0, galley.size().x, rect);
        painter.galley(
            Pos2::new(label_x, rect.bottom() - 25.0),
            galley,
            Color32::DARK_GRAY,
        );

        freq += FREQ_GRID_STEP;
    }

    // Horizontal grid: -40 dB to +60 dB every 20 dB.
    let mut db = MIN_DB as i32;
    while db <= MAX_DB as i32 {
        let y = db_to_y(db as f32, rect);
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            grid_stroke,
        );
        painter.text(
            Pos2::new(rect.left() + LABEL_MARGIN, y - 15.0),
            Align2::LEFT_TOP,
            format!("{} dB", db),
            label_font.clone(),
            Color32::DARK_GRAY,
        );
        db += DB_GRID_STEP;
    }

    // Center frequency marker.
    let center_x = freq_to_x(center_freq_hz, center_freq_hz, sample_rate_hz, rect);
    painter.line_segment(
        [
            Pos2::new(center_x, rect.top()),
            Pos2::new(center_x, rect.bottom()),
        ],
        Stroke::new(1.0, Color32::RED),
    );
    painter.text(
        Pos2::new(center_x, rect.bottom() - 35.0),
        Align2::CENTER_TOP,
        format!("CF: {:.3} MHz", center_freq_hz as f64 / 1e6),
        label_font,
        Color32::DARK_RED,
    );

    // Magnitude trace.
    let trace = Stroke::new(1.0, Color32::BLUE);
    let x_step = rect.width() / (magnitudes.len() - 1) as f32;
    let mut prev = Pos2::new(rect.left(), db_to_y(magnitudes[0].clamp(MIN_DB, MAX_DB), rect));
    for (i, &db) in magnitudes.iter().enumerate().skip(1) {
        let point = Pos2::new(
            rect.left() + i as f32 * x_step,
            db_to_y(db.clamp(MIN_DB, MAX_DB), rect),
        );
        painter.line_segment([prev, point], trace);
        prev = point;
    }
}

/// First grid frequency at or above `span_start`.
fn grid_start(span_start: u32, step: u32) -> u32 {
    span_start.div_ceil(step) * step
}

/// Map a frequency to a panel x coordinate.
///
/// `(f - center)/rate` spans [-0.5, 0.5] across the panel; adding 0.5
/// normalizes to [0, 1].
fn freq_to_x(freq_hz: u32, center_freq_hz: u32, sample_rate_hz: u32, rect: Rect) -> f32 {
    let frac = (freq_hz as f64 - center_freq_hz as f64) / sample_rate_hz as f64 + 0.5;
    rect.left() + frac as f32 * rect.width()
}

/// Map a dB value to a panel y coordinate (MIN_DB at the bottom edge).
fn db_to_y(db: f32, rect: Rect) -> f32 {
    rect.bottom() - (db - MIN_DB) / (MAX_DB - MIN_DB) * rect.height()
}

/// Keep a label of `width` inside the panel with a small margin.
fn clamp_label_x(x: f32, width: f32, rect: Rect) -> f32 {
    x.clamp(
        rect.left() + LABEL_MARGIN,
        rect.right() - width - LABEL_MARGIN,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Rect {
        Rect::from_min_max(Pos2::new(0.0, 300.0), Pos2::new(1024.0, 600.0))
    }

    #[test]
    fn test_grid_start_ceils_to_step() {
        // 98.4 MHz center, 1.92 MHz span: the band starts at 97.44 MHz
        // and the first line lands on 97.5 MHz.
        assert_eq!(grid_start(97_440_000, 500_000), 97_500_000);
        // Exact multiples stay put.
        assert_eq!(grid_start(97_500_000, 500_000), 97_500_000);
        assert_eq!(grid_start(1, 500_000), 500_000);
    }

    #[test]
    fn test_center_frequency_maps_to_middle() {
        let x = freq_to_x(98_400_000, 98_400_000, 1_920_000, panel());
        assert!((x - 512.0).abs() < 0.5);
    }

    #[test]
    fn test_band_edges_map_to_panel_edges() {
        let rect = panel();
        let left = freq_to_x(98_400_000 - 960_000, 98_400_000, 1_920_000, rect);
        let right = freq_to_x(98_400_000 + 960_000, 98_400_000, 1_920_000, rect);
        assert!((left - rect.left()).abs() < 0.5);
        assert!((right - rect.right()).abs() < 0.5);
    }

    #[test]
    fn test_db_range_maps_to_panel_height() {
        let rect = panel();
        assert!((db_to_y(MIN_DB, rect) - rect.bottom()).abs() < 0.5);
        assert!((db_to_y(MAX_DB, rect) - rect.top()).abs() < 0.5);
        assert!((db_to_y(10.0, rect) - rect.center().y).abs() < 0.5);
    }

    #[test]
    fn test_labels_clamp_inside_panel() {
        let rect = panel();
        assert_eq!(clamp_label_x(-30.0, 40.0, rect), rect.left() + LABEL_MARGIN);
        assert_eq!(
            clamp_label_x(1020.0, 40.0, rect),
            rect.right() - 40.0 - LABEL_MARGIN
        );
        assert_eq!(clamp_label_x(500.0, 40.0, rect), 500.0);
    }
}
