//! Raw I/Q panel: the byte stream as an amplitude polyline.

use egui::{Color32, Painter, Pos2, Rect, Stroke};

use airwave_core::byte_to_level;

/// Draw the raw byte buffer into `rect`.
///
/// Each byte maps to `(u - 127.5)/127.5`, scaled by the volume slider
/// and half the panel height, centered vertically, and clamped to the
/// panel.
pub fn draw(painter: &Painter, rect: Rect, bytes: &[u8], volume: f32) {
    if bytes.len() < 2 {
        return;
    }

    let stroke = Stroke::new(1.0, Color32::DARK_GREEN);
    let x_step = rect.width() / (bytes.len() - 1) as f32;

    let mut prev = Pos2::new(rect.left(), sample_y(bytes[0], volume, rect));
    for (i, &byte) in bytes.iter().enumerate().skip(1) {
        let point = Pos2::new(rect.left() + i as f32 * x_step, sample_y(byte, volume, rect));
        painter.line_segment([prev, point], stroke);
        prev = point;
    }
}

/// Map one byte to a panel y coordinate.
fn sample_y(byte: u8, volume: f32, rect: Rect) -> f32 {
    let amplitude = rect.height() / 2.0;
    let center_y = rect.top() + amplitude;
    let level = byte_to_level(byte) as f32;
    (center_y - level * amplitude * volume).clamp(rect.top(), rect.bottom())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Rect {
        Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1024.0, 300.0))
    }

    #[test]
    fn test_neutral_byte_sits_on_center_line() {
        let y = sample_y(127, 1.0, panel());
        assert!((y - 150.0).abs() < 1.0);
    }

    #[test]
    fn test_extremes_reach_panel_edges() {
        let rect = panel();
        assert!((sample_y(255, 1.0, rect) - rect.top()).abs() < 0.5);
        assert!((sample_y(0, 1.0, rect) - rect.bottom()).abs() < 0.5);
    }

    #[test]
    fn test_volume_scales_amplitude() {
        let rect = panel();
        let full = sample_y(255, 1.0, rect);
        let half = sample_y(255, 0.5, rect);
        let muted = sample_y(255, 0.0, rect);

        assert!(full < half && half < muted);
        assert!((muted - rect.center().y).abs() < 0.5);
    }

    #[test]
    fn test_values_clamped_to_panel() {
        let rect = panel();
        // An oversized volume would push points past the panel edge.
        let y = sample_y(255, 4.0, rect);
        assert_eq!(y, rect.top());
    }
}
