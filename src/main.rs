//! Map Overlay
//!
//! A Windows system tray application that reads the map name shown in a
//! fixed screen zone with OCR and overlays the matching map image.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]
// The Win32 shell is the only entry point; elsewhere the core is test-only
#![cfg_attr(not(windows), allow(dead_code))]

mod capture;
mod config;
mod input;
mod maps;
mod ocr;
mod overlay;
mod paths;
mod session;
#[cfg(windows)]
mod tray;

use anyhow::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

use config::AppConfig;
use ocr::TesseractPaths;

const LOG_FILE_NAME: &str = "map_overlay.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    // Ensure output directories exist
    paths::ensure_directories()?;

    let config = config::load_config(&paths::get_config_path());

    // Locate Tesseract and make sure the trained data is present
    let tessdata = paths::resolve(&config.tessdata_dir);
    let tesseract = match ocr::ensure_tesseract(&tessdata, &config.language) {
        Ok(found) => found,
        Err(e) => {
            log(&format!("Warning: Failed to setup Tesseract: {:#}", e));
            log("Map detection will not work until Tesseract is installed.");
            // Detection retries the bare command and reports why it fails
            TesseractPaths {
                executable: "tesseract".into(),
                tessdata,
            }
        }
    };

    run(config, tesseract)
}

/// Builds the session and runs the tray application.
#[cfg(windows)]
fn run(config: AppConfig, tesseract: TesseractPaths) -> Result<()> {
    use capture::GdiCapturer;
    use input::key_name;
    use maps::MapLibrary;
    use ocr::TesseractSettings;
    use overlay::{OverlayGeometry, OverlayPresenter, OverlaySettings, Win32OverlayHost};
    use session::{OcrDetector, Session};

    let maps_dir = paths::resolve(&config.maps_dir);
    if !maps_dir.is_dir() {
        log(&format!(
            "Warning: Maps directory not found: {}",
            maps_dir.display()
        ));
    }

    let factory = TesseractSettings {
        paths: tesseract,
        language: config.language.clone(),
        page_seg_mode: config.page_seg_mode,
        char_whitelist: config.char_whitelist.clone(),
    };
    let capturer = GdiCapturer {
        indicator_ms: config.capture_indicator_ms,
    };
    let debug_dir = config.debug_snapshots.then(paths::get_debug_dir);
    let detector = OcrDetector::new(capturer, factory, config.capture_zone, debug_dir);

    let presenter = OverlayPresenter::new(
        Win32OverlayHost,
        OverlayGeometry::from(&config.overlay),
        OverlaySettings::from(&config.overlay),
    );

    let mut session = Session::new(detector, MapLibrary::new(&maps_dir), presenter);

    let keys = &config.hotkeys;
    log("Map Overlay started");
    log(&format!("Maps directory: {}", maps_dir.display()));
    log(&format!("Hotkey: {} (detect map)", key_name(keys.detect)));
    log(&format!("Hotkey: {} (next variant)", key_name(keys.cycle)));
    log(&format!("Hotkey: {} (close overlay)", key_name(keys.close)));
    log("Right-click tray icon for opacity, size, position and exit");

    tray::run(&mut session, keys)
}

#[cfg(not(windows))]
fn run(_config: AppConfig, _tesseract: TesseractPaths) -> Result<()> {
    let message = "Map Overlay needs Windows: screen capture, hotkeys and overlays use Win32";
    log(message);
    Err(anyhow::anyhow!(message))
}
