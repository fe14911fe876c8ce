//! The receiver window: top bar, raw I/Q panel, spectrum panel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use airwave_core::rt::ByteRing;
use airwave_core::spectrum::SpectrumAnalyzer;

use crate::views;

/// Default window geometry.
pub const WINDOW_WIDTH: f32 = 1024.0;
pub const WINDOW_HEIGHT: f32 = 600.0;

/// Bins in the displayed spectrum.
const FFT_SIZE: usize = 1024;

/// The eframe application driving both visualization panels.
///
/// Sole consumer of the GUI ring. Each frame pops the freshest bytes,
/// refreshes the spectrum when a full FFT frame is available, and keeps
/// the previous display otherwise, so a starved ring dims nothing.
pub struct ReceiverApp {
    gui_ring: Arc<ByteRing>,
    running: Arc<AtomicBool>,
    analyzer: SpectrumAnalyzer,
    /// Last bytes shown in the raw I/Q panel.
    raw: Vec<u8>,
    /// Scratch buffer for ring pops.
    scratch: Vec<u8>,
    /// Last computed spectrum, in dB.
    magnitudes: Vec<f32>,
    /// Display-only amplitude scaling for the raw I/Q panel.
    volume: f32,
    sample_rate_hz: u32,
    center_freq_hz: u32,
}

impl ReceiverApp {
    pub fn new(
        gui_ring: Arc<ByteRing>,
        running: Arc<AtomicBool>,
        sample_rate_hz: u32,
        center_freq_hz: u32,
    ) -> Self {
        Self {
            gui_ring,
            running,
            analyzer: SpectrumAnalyzer::new(FFT_SIZE),
            raw: Vec::new(),
            scratch: Vec::new(),
            magnitudes: vec![views::spectrum::MIN_DB; FFT_SIZE],
            volume: 1.0,
            sample_rate_hz,
            center_freq_hz,
        }
    }

    fn poll_ring(&mut self) {
        self.gui_ring.pop(&mut self.scratch, 2 * FFT_SIZE);
        if self.scratch.is_empty() {
            return;
        }
        std::mem::swap(&mut self.raw, &mut self.scratch);
        if let Some(magnitudes) = self.analyzer.process(&self.raw) {
            self.magnitudes = magnitudes;
        }
    }
}

impl eframe::App for ReceiverApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.running.load(Ordering::Relaxed) {
            // The producer is gone; take the window down with it.
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.poll_ring();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Airwave SDR");
                ui.separator();
                ui.label(format!("{:.3} MHz", self.center_freq_hz as f64 / 1e6));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add(egui::Slider::new(&mut self.volume, 0.0..=1.0).text("Volume"));
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::hover());
            let rect = response.rect;

            let mid_y = rect.center().y;
            let raw_rect = egui::Rect::from_min_max(rect.min, egui::pos2(rect.max.x, mid_y));
            let spectrum_rect = egui::Rect::from_min_max(egui::pos2(rect.min.x, mid_y), rect.max);

            views::raw_iq::draw(&painter, raw_rect, &self.raw, self.volume);
            views::spectrum::draw(
                &painter,
                spectrum_rect,
                &self.magnitudes,
                self.center_freq_hz,
                self.sample_rate_hz,
            );

            painter.line_segment(
                [egui::pos2(rect.left(), mid_y), egui::pos2(rect.right(), mid_y)],
                egui::Stroke::new(1.0, egui::Color32::DARK_GRAY),
            );
            let caption = egui::FontId::proportional(14.0);
            painter.text(
                raw_rect.left_top() + egui::vec2(10.0, 10.0),
                egui::Align2::LEFT_TOP,
                "Raw IQ samples",
                caption.clone(),
                egui::Color32::DARK_GREEN,
            );
            painter.text(
                spectrum_rect.left_top() + egui::vec2(10.0, 10.0),
                egui::Align2::LEFT_TOP,
                "FFT magnitude (dB)",
                caption,
                egui::Color32::DARK_BLUE,
            );
        });

        // Stream display: repaint continuously rather than on input.
        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with_ring(capacity: usize) -> (ReceiverApp, Arc<ByteRing>) {
        let ring = Arc::new(ByteRing::with_capacity(capacity).unwrap());
        let running = Arc::new(AtomicBool::new(true));
        let app = ReceiverApp::new(Arc::clone(&ring), running, 1_920_000, 98_400_000);
        (app, ring)
    }

    #[test]
    fn test_poll_keeps_last_display_on_empty_ring() {
        let (mut app, ring) = app_with_ring(1 << 12);

        assert!(ring.push(&[200u8; 2 * FFT_SIZE]));
        app.poll_ring();
        assert_eq!(app.raw.len(), 2 * FFT_SIZE);
        let spectrum_before = app.magnitudes.clone();

        // Ring drained: the previous frame stays up.
        app.poll_ring();
        assert_eq!(app.raw.len(), 2 * FFT_SIZE);
        assert_eq!(app.magnitudes, spectrum_before);
    }

    #[test]
    fn test_short_pop_skips_spectrum_refresh() {
        let (mut app, ring) = app_with_ring(1 << 12);
        let initial = app.magnitudes.clone();

        assert!(ring.push(&[1u8; 100]));
        app.poll_ring();

        assert_eq!(app.raw.len(), 100);
        assert_eq!(app.magnitudes, initial);
    }

    #[test]
    fn test_full_frame_refreshes_spectrum() {
        let (mut app, ring) = app_with_ring(1 << 12);
        let initial = app.magnitudes.clone();

        let carrier: Vec<u8> = [255u8, 127].repeat(FFT_SIZE);
        assert!(ring.push(&carrier));
        app.poll_ring();

        assert_eq!(app.magnitudes.len(), FFT_SIZE);
        assert_ne!(app.magnitudes, initial);
    }
}
