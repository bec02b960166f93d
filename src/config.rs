//! Startup configuration.
//!
//! Loads settings from config.json next to the executable. Every field has a
//! default, so a partial file only overrides what it names. Overlay values
//! here are only the startup defaults; changes made from the tray menu live in
//! the session and are not written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::capture::CaptureRect;
use crate::overlay::Anchor;

/// Characters Tesseract is allowed to produce for map names.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 -'\u{00C0}\u{00E0}";

/// Virtual-key codes for the three single-key triggers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Start map detection (F3)
    pub detect: u32,
    /// Cycle to the next image variant (F1)
    pub cycle: u32,
    /// Close the current overlay (F2)
    pub close: u32,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            detect: 0x72, // VK_F3
            cycle: 0x70,  // VK_F1
            close: 0x71,  // VK_F2
        }
    }
}

/// Startup defaults for the result overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayDefaults {
    /// Overlay width at 100% size
    pub base_width: u32,
    /// Overlay height at 100% size
    pub base_height: u32,
    /// Opacity in percent (10-100)
    pub opacity_percent: u8,
    /// Size in percent of the base size (50-200)
    pub size_percent: u16,
    /// Screen anchor
    pub anchor: Anchor,
    /// Distance from the screen edges in pixels
    pub margin: i32,
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            base_width: 420,
            base_height: 380,
            opacity_percent: 50,
            size_percent: 80,
            anchor: Anchor::TopLeft,
            margin: 20,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Screen rectangle scanned for the map name (tuned for 1920x1080)
    pub capture_zone: CaptureRect,
    /// Directory containing `<language>.traineddata`
    pub tessdata_dir: String,
    /// Tesseract language profile
    pub language: String,
    /// Character whitelist passed to Tesseract (empty = unrestricted)
    pub char_whitelist: String,
    /// Tesseract page segmentation mode (`None` = engine default)
    pub page_seg_mode: Option<u8>,
    /// Directory holding `<key>.jpg` files and `<key>/` variant folders
    pub maps_dir: String,
    /// Overlay startup defaults
    pub overlay: OverlayDefaults,
    /// Global hotkeys
    pub hotkeys: HotkeyConfig,
    /// How long the capture-zone indicator stays visible (milliseconds)
    pub capture_indicator_ms: u32,
    /// Save captures that produced no text to logs/debug/
    pub debug_snapshots: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture_zone: CaptureRect {
                x: 700,
                y: 885,
                width: 580,
                height: 27,
            },
            tessdata_dir: "tessdata".to_string(),
            language: "eng".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: None,
            maps_dir: "Maps".to_string(),
            overlay: OverlayDefaults::default(),
            hotkeys: HotkeyConfig::default(),
            capture_indicator_ms: 800,
            debug_snapshots: false,
        }
    }
}

/// Loads configuration from the given path or returns defaults.
pub fn load_config(config_path: &Path) -> AppConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    AppConfig::default()
}
