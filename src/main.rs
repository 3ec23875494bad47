//! Application entry point — Zamzami ordering assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults are written out on first run).
//! 3. Open the settings store (defaults when missing; a sibling file when
//!    the record cannot be read).
//! 4. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Start the speech output stream (detached clock when no device).
//! 6. Spawn the session controller on the tokio runtime.
//! 7. Install an Arabic-capable font and run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use tokio::sync::mpsc;
use zamzami_assistant::{
    app::ZamzamiApp,
    audio::{CpalInput, PlaybackHandle},
    config::{AppConfig, AppPaths},
    fonts,
    live::WsConnector,
    session::{new_shared_assistant, SessionCommand, SessionController},
    store::SettingsStore,
};

use eframe::egui;

/// Device rate assumed for the silent clock when no output device opens.
const FALLBACK_DEVICE_RATE: u32 = 48_000;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("الزمزمي للمستهلكات الطبية")
        .with_inner_size([width, height])
        .with_min_inner_size([480.0, 420.0]);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Zamzami assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();
    if !paths.settings_file.exists() {
        // Leave an editable file behind for the operator.
        match config.save() {
            Ok(()) => log::info!("config: wrote defaults to {}", paths.settings_file.display()),
            Err(e) => log::warn!("config: could not write defaults: {e}"),
        }
    }

    // 3. Settings store
    let store = SettingsStore::open_or_fallback(&paths.store_file);
    log::info!("store: using {}", store.path().display());
    let store = store.shared();

    // 4. Tokio runtime (controller + WebSocket reader)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 5. Speech output
    let playback = PlaybackHandle::start(&config.audio).unwrap_or_else(|e| {
        log::warn!("playback: output unavailable ({e}); speech will not be heard");
        PlaybackHandle::detached(config.audio.playback_sample_rate, FALLBACK_DEVICE_RATE)
    });

    // 6. Session controller
    let assistant = new_shared_assistant();
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);

    let controller = SessionController::new(
        config.live.clone(),
        Arc::clone(&assistant),
        Arc::clone(&store),
        Arc::new(WsConnector),
        Arc::new(CpalInput::new(&config.audio)),
        Arc::new(playback),
        config.audio.frame_queue,
    );
    rt.spawn(controller.run(command_rx));

    // 7. Build the egui app and run it (blocks until the window is closed)
    let app = ZamzamiApp::new(assistant, store, command_tx, paths.invoice_dir.clone());
    let options = native_options(&config);
    let font_path = config.ui.font_path.clone();

    eframe::run_native(
        "Zamzami Assistant",
        options,
        Box::new(move |cc| {
            fonts::install(&cc.egui_ctx, font_path.as_deref());
            Ok(Box::new(app))
        }),
    )
}
