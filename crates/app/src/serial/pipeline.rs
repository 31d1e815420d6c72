//! Blocking reassembly loop: read length-prefixed frames off the serial
//! link, run detection, publish to the preview server, react to keys.
//!
//! One bad frame never stops the loop — decode failures and stream desyncs
//! are counted, logged, and skipped. Only a closed stream or an explicit
//! quit (key or Ctrl+C) ends the run.

use std::{
    io,
    path::Path,
    sync::{
        Arc, Mutex, Once,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use detect_core::DetectorOptions;
use frame_ingest::{FrameReader, IngestError, open_serial_port};
use tracing::{debug, error, info, warn};

use crate::{
    data::SharedFrame,
    processing::process_frame,
    serial::{SerialConfig, preview::spawn_preview_server},
    telemetry,
};

enum KeyAction {
    Save,
    Quit,
}

pub(crate) fn run(config: SerialConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let detector = detect_core::load_detector(
        &config.model_path,
        DetectorOptions {
            confidence_threshold: config.confidence,
            input_size: (config.input_size, config.input_size),
            use_cpu: config.use_cpu,
        },
    )?;
    let _ = telemetry::init_metrics_recorder();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let port = open_serial_port(&config.device, config.baud_rate, config.timeout)?;
    // Give USB-serial adapters a moment to settle before the first read.
    thread::sleep(Duration::from_secs(2));
    let mut reader = FrameReader::new(port);

    let shared: SharedFrame = Arc::new(Mutex::new(None));
    let preview = spawn_preview_server(shared.clone(), config.preview_port)?;
    info!(
        "preview available at http://127.0.0.1:{}/frame.jpg and /stream.mjpg",
        config.preview_port
    );
    info!("reading frames from {} — s saves, q or Esc quits", config.device);

    // Key handling needs a terminal in raw mode; without one (e.g. under a
    // service manager) the loop still runs and Ctrl+C stops it.
    let raw_mode = crossterm::terminal::enable_raw_mode().is_ok();

    let mut frame_count: u64 = 0;
    let outcome = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(());
        }

        match reader.next_frame() {
            Ok(payload) => match process_frame(
                detector.as_ref(),
                &payload,
                frame_count + 1,
                config.jpeg_quality,
                true,
            ) {
                Ok(packet) => {
                    frame_count += 1;
                    if config.verbose {
                        debug!(
                            "frame #{frame_count}: {} byte payload, {} detection(s)",
                            payload.len(),
                            packet.summary.total_detections
                        );
                    }
                    if let Ok(mut guard) = shared.lock() {
                        *guard = Some(packet);
                    }
                }
                Err(IngestError::Decode(err)) => {
                    metrics::counter!("camgate_decode_failures_total", "source" => "serial")
                        .increment(1);
                    warn!("discarding undecodable frame payload: {err}");
                }
                Err(err) => {
                    error!("frame processing failed: {err:?}");
                }
            },
            Err(IngestError::Desync { got }) => {
                metrics::counter!("camgate_serial_desyncs_total").increment(1);
                warn!("serial stream desynchronised (marker {got:?}); frame discarded");
            }
            Err(IngestError::Io(err)) if err.kind() == io::ErrorKind::TimedOut => {
                // Idle link; loop back around and check for shutdown/keys.
            }
            Err(IngestError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break Err(anyhow!("serial stream closed: {err}"));
            }
            Err(err) => {
                error!("serial read error: {err}");
            }
        }

        match poll_key() {
            Some(KeyAction::Save) => save_latest(&shared, &config.save_dir),
            Some(KeyAction::Quit) => break Ok(()),
            None => {}
        }
    };

    if raw_mode {
        let _ = crossterm::terminal::disable_raw_mode();
    }
    preview.stop();
    info!("serial pipeline stopped after {frame_count} frame(s)");

    outcome
}

/// Non-blocking key poll. Ctrl+C is mapped here too because raw mode
/// suppresses the signal.
fn poll_key() -> Option<KeyAction> {
    match event::poll(Duration::ZERO) {
        Ok(true) => match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('s') => Some(KeyAction::Save),
                KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(KeyAction::Quit)
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

/// Persist the current annotated frame under a counter-based filename.
/// Failures are logged and the loop carries on.
fn save_latest(shared: &SharedFrame, dir: &Path) {
    let packet = shared.lock().ok().and_then(|guard| guard.clone());
    let Some(packet) = packet else {
        warn!("no frame to save yet");
        return;
    };
    let path = dir.join(format!("frame_{:06}.jpg", packet.summary.frame_number));
    match std::fs::write(&path, &packet.jpeg) {
        Ok(()) => info!("saved {}", path.display()),
        Err(err) => error!("failed to save {}: {err}", path.display()),
    }
}
