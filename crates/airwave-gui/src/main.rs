//! Airwave — FM broadcast receiver for RTL-SDR dongles (entry point).
//!
//! Tunes the dongle, runs the capture pipeline, plays demodulated mono
//! audio, and shows the raw I/Q waveform plus the live spectrum.

use std::time::Duration;

use clap::Parser;

use airwave_core::demod::FmDemodulator;
use airwave_core::rt::RingError;
use airwave_gui::audio::{AudioError, AudioOutput, TARGET_AUDIO_RATE};
use airwave_gui::hal::{Tuner, TunerError};
use airwave_gui::pipeline::Pipeline;
use airwave_gui::{app, ReceiverApp};

#[derive(Debug, Parser)]
#[command(name = "airwave", about = "FM broadcast receiver for RTL-SDR dongles")]
struct Cli {
    /// Sample rate in MHz
    #[arg(short = 's', value_name = "MHZ", default_value_t = 1.92)]
    sample_rate: f64,

    /// Center frequency in MHz
    #[arg(short = 'f', value_name = "MHZ", default_value_t = 98.4)]
    frequency: f64,

    /// Tuner gain in dB
    #[arg(short = 'g', value_name = "DB", default_value_t = 35)]
    gain: i32,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Tuner(#[from] TunerError),

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("window error: {0}")]
    Window(#[from] eframe::Error),
}

fn mhz_to_hz(mhz: f64) -> u32 {
    (mhz * 1e6).round() as u32
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help goes to stdout and exits clean; a bad flag is an error.
            let failed = e.use_stderr();
            let _ = e.print();
            std::process::exit(if failed { 1 } else { 0 });
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let sample_rate_hz = mhz_to_hz(cli.sample_rate);
    let center_freq_hz = mhz_to_hz(cli.frequency);

    let demod = FmDemodulator::new(sample_rate_hz, TARGET_AUDIO_RATE);
    if sample_rate_hz % TARGET_AUDIO_RATE != 0 {
        tracing::warn!(
            "sample rate {} Hz is not a multiple of {} Hz; audio will play at {} Hz",
            sample_rate_hz,
            TARGET_AUDIO_RATE,
            sample_rate_hz / demod.decimation() as u32,
        );
    }

    let mut tuner = Tuner::open(0)?;
    tuner.configure(sample_rate_hz, center_freq_hz, cli.gain)?;

    let mut pipeline = Pipeline::start(tuner)?;

    // Give the producer a head start so the first audio periods have
    // data to pull.
    tracing::info!("buffering...");
    std::thread::sleep(Duration::from_millis(500));

    let audio = AudioOutput::start(pipeline.audio_ring(), demod, TARGET_AUDIO_RATE)?;

    let receiver = ReceiverApp::new(
        pipeline.gui_ring(),
        pipeline.run_flag(),
        sample_rate_hz,
        center_freq_hz,
    );
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([app::WINDOW_WIDTH, app::WINDOW_HEIGHT])
            .with_title("Airwave SDR"),
        ..Default::default()
    };
    let window_result = eframe::run_native(
        "Airwave SDR",
        options,
        Box::new(|_cc| Ok(Box::new(receiver))),
    );

    // Window closed (or failed): drain the threads, then silence the
    // audio device before its demodulator goes away.
    pipeline.shutdown();
    audio.stop();

    window_result?;
    Ok(())
}
