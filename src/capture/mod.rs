//! Screen capture of the fixed map-name zone.
//!
//! This module provides:
//! - The capture rectangle (`CaptureRect`)
//! - The capturer seam used by detection (`ScreenCapturer`)
//! - Capture-zone indicator geometry (`indicator`)
//! - GDI screen copy on Windows (`screen`)

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub mod indicator;
#[cfg(windows)]
pub mod screen;

#[cfg(windows)]
pub use screen::GdiCapturer;

/// A rectangle in primary-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRect {
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Copies screen pixels for detection.
pub trait ScreenCapturer {
    /// Returns an image of exactly `rect.width x rect.height`.
    fn capture(&self, rect: CaptureRect) -> Result<RgbImage>;

    /// Briefly highlights the zone that was captured.
    fn show_capture_zone(&self, _rect: CaptureRect) {}
}

/// Converts a top-down 32-bit BGRA buffer into an RGB image.
///
/// Returns `None` when the buffer is shorter than `width * height * 4`.
pub fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let needed = width as usize * height as usize * 4;
    if bgra.len() < needed {
        return None;
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in bgra[..needed].chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }

    RgbImage::from_raw(width, height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rect_edges() {
        let rect = CaptureRect {
            x: 700,
            y: 885,
            width: 580,
            height: 27,
        };
        assert_eq!(rect.right(), 1280);
        assert_eq!(rect.bottom(), 912);
        assert!(!rect.is_empty());
        assert!(CaptureRect { width: 0, ..rect }.is_empty());
    }

    #[test]
    fn test_bgra_to_rgb_swaps_channels() {
        let bgra = [10, 20, 30, 255, 1, 2, 3, 0];
        let img = bgra_to_rgb(&bgra, 2, 1).unwrap();

        assert_eq!(*img.get_pixel(0, 0), Rgb([30, 20, 10]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([3, 2, 1]));
    }

    #[test]
    fn test_bgra_to_rgb_rejects_short_buffer() {
        assert!(bgra_to_rgb(&[0; 7], 2, 1).is_none());
    }

    #[test]
    fn test_rect_deserializes_from_config_shape() {
        let rect: CaptureRect =
            serde_json::from_str(r#"{"x":-10,"y":5,"width":100,"height":20}"#).unwrap();
        assert_eq!(rect.x, -10);
        assert_eq!(rect.height, 20);
    }
}
