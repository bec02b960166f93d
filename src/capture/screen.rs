//! Screen copy using GDI.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    HGDIOBJ, ROP_CODE, SRCCOPY,
};

use super::{bgra_to_rgb, indicator, CaptureRect, ScreenCapturer};

/// Copies from the screen device context, layered windows included.
pub struct GdiCapturer {
    /// How long the capture-zone indicator stays up
    pub indicator_ms: u32,
}

impl ScreenCapturer for GdiCapturer {
    fn capture(&self, rect: CaptureRect) -> Result<RgbImage> {
        capture_screen_rect(rect)
    }

    fn show_capture_zone(&self, rect: CaptureRect) {
        if let Err(e) = indicator::show(rect, self.indicator_ms) {
            crate::log(&format!("Failed to show capture zone: {}", e));
        }
    }
}

/// Copies `rect` from the primary screen.
///
/// Parts of the rectangle outside the screen come back black.
pub fn capture_screen_rect(rect: CaptureRect) -> Result<RgbImage> {
    if rect.is_empty() {
        return Err(anyhow!(
            "Capture area has zero size: {}x{}",
            rect.width,
            rect.height
        ));
    }

    let width = rect.width as i32;
    let height = rect.height as i32;

    let pixels = unsafe {
        let screen_dc = GetDC(None);
        if screen_dc.is_invalid() {
            return Err(anyhow!("Failed to get screen device context"));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let old_bitmap = SelectObject(mem_dc, HGDIOBJ(bitmap.0));

        let blit = BitBlt(
            mem_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            rect.x,
            rect.y,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        );

        // Bitmap must be deselected before GetDIBits
        SelectObject(mem_dc, old_bitmap);

        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut buffer = vec![0u8; rect.width as usize * rect.height as usize * 4];

        let lines = if blit.is_ok() {
            GetDIBits(
                screen_dc,
                bitmap,
                0,
                rect.height,
                Some(buffer.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        let _ = DeleteObject(HGDIOBJ(bitmap.0));
        let _ = DeleteDC(mem_dc);
        ReleaseDC(None, screen_dc);

        blit.context("BitBlt from screen failed")?;
        if lines == 0 {
            return Err(anyhow!("GetDIBits returned no scan lines"));
        }

        buffer
    };

    bgra_to_rgb(&pixels, rect.width, rect.height)
        .ok_or_else(|| anyhow!("Captured buffer does not match {}x{}", rect.width, rect.height))
}
