//! Capture-zone indicator: a dimmed full-screen flash with a glowing outline
//! around the zone that was just read.

use super::CaptureRect;

/// Green the glow fades toward.
pub const GLOW_COLOR: (u8, u8, u8) = (0, 255, 127);
/// Opacity of the dimmed backdrop, out of 255 (35%).
pub const BACKDROP_ALPHA: u8 = 89;
pub const CAPTION: &str = "Capture area";
/// Caption distance above the zone.
pub const CAPTION_OFFSET: i32 = 20;
/// Corner radius of every ring.
pub const CORNER_RADIUS: i32 = 8;

const GLOW_STEPS: i32 = 5;
const OUTLINE_WIDTH: i32 = 2;
const OUTLINE_INTENSITY: u8 = 200;

/// Edges of a drawn rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edges {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// One rounded outline, drawn outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlowRing {
    pub edges: Edges,
    pub pen_width: i32,
    pub color: (u8, u8, u8),
}

/// Scales [`GLOW_COLOR`] by `intensity / 255` over a black backdrop.
pub fn glow_color(intensity: u8) -> (u8, u8, u8) {
    let scale = |c: u8| ((c as u32 * intensity as u32 + 127) / 255) as u8;
    (scale(GLOW_COLOR.0), scale(GLOW_COLOR.1), scale(GLOW_COLOR.2))
}

/// Rings for the zone: five faint rings inflated by 5..1 px, then the main
/// outline on the zone itself.
pub fn glow_rings(zone: CaptureRect) -> Vec<GlowRing> {
    let mut rings: Vec<GlowRing> = (1..=GLOW_STEPS)
        .rev()
        .map(|i| GlowRing {
            edges: inflate(zone, i),
            pen_width: i,
            color: glow_color((20 * (6 - i)) as u8),
        })
        .collect();

    rings.push(GlowRing {
        edges: inflate(zone, 0),
        pen_width: OUTLINE_WIDTH,
        color: glow_color(OUTLINE_INTENSITY),
    });

    rings
}

/// Top-left corner of the caption.
pub fn caption_origin(zone: CaptureRect) -> (i32, i32) {
    (zone.x, zone.y - CAPTION_OFFSET)
}

fn inflate(zone: CaptureRect, by: i32) -> Edges {
    Edges {
        left: zone.x - by,
        top: zone.y - by,
        right: zone.right() + by,
        bottom: zone.bottom() + by,
    }
}

#[cfg(windows)]
pub use window::show;

#[cfg(windows)]
mod window {
    use anyhow::{anyhow, Result};
    use std::sync::Once;

    use windows::core::w;
    use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::Graphics::Gdi::{
        BeginPaint, CreatePen, CreateSolidBrush, DeleteObject, EndPaint, FillRect,
        GetStockObject, RoundRect, SelectObject, SetBkMode, SetTextColor, TextOutW, HGDIOBJ,
        NULL_BRUSH, PAINTSTRUCT, PS_SOLID, TRANSPARENT,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, GetWindowLongPtrW,
        KillTimer, RegisterClassW, SetLayeredWindowAttributes, SetTimer, SetWindowLongPtrW,
        ShowWindow, GWLP_USERDATA, LWA_ALPHA, SM_CXSCREEN, SM_CYSCREEN, SW_SHOWNOACTIVATE,
        WM_DESTROY, WM_PAINT, WM_TIMER, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
        WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
    };

    use super::{caption_origin, glow_rings, GlowRing, BACKDROP_ALPHA, CAPTION, CORNER_RADIUS};
    use crate::capture::CaptureRect;

    const DISMISS_TIMER_ID: usize = 1;

    static REGISTER_CLASS: Once = Once::new();

    struct IndicatorState {
        rings: Vec<GlowRing>,
        caption_at: (i32, i32),
    }

    fn rgb((r, g, b): (u8, u8, u8)) -> COLORREF {
        COLORREF(r as u32 | (g as u32) << 8 | (b as u32) << 16)
    }

    /// Shows the indicator over the primary screen and closes it after
    /// `duration_ms`.
    pub fn show(zone: CaptureRect, duration_ms: u32) -> Result<()> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;
            let class_name = w!("MapOverlayCaptureIndicator");

            REGISTER_CLASS.call_once(|| {
                let wc = WNDCLASSW {
                    lpfnWndProc: Some(indicator_proc),
                    hInstance: hinstance.into(),
                    lpszClassName: class_name,
                    ..Default::default()
                };
                if RegisterClassW(&wc) == 0 {
                    crate::log("Failed to register indicator window class");
                }
            });

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                class_name,
                w!("Capture area"),
                WS_POPUP,
                0,
                0,
                GetSystemMetrics(SM_CXSCREEN),
                GetSystemMetrics(SM_CYSCREEN),
                None,
                None,
                hinstance,
                None,
            )?;

            if let Err(e) = SetLayeredWindowAttributes(hwnd, COLORREF(0), BACKDROP_ALPHA, LWA_ALPHA) {
                crate::log(&format!("Failed to set indicator opacity: {}", e));
            }

            let state = Box::new(IndicatorState {
                rings: glow_rings(zone),
                caption_at: caption_origin(zone),
            });
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::into_raw(state) as isize);

            if SetTimer(hwnd, DISMISS_TIMER_ID, duration_ms, None) == 0 {
                let _ = DestroyWindow(hwnd);
                return Err(anyhow!("Failed to start indicator timer"));
            }

            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }

        Ok(())
    }

    unsafe extern "system" fn indicator_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        unsafe {
            match msg {
                WM_PAINT => {
                    let state = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const IndicatorState;
                    let mut ps = PAINTSTRUCT::default();
                    let hdc = BeginPaint(hwnd, &mut ps);

                    let backdrop = CreateSolidBrush(COLORREF(0));
                    FillRect(hdc, &ps.rcPaint, backdrop);
                    let _ = DeleteObject(HGDIOBJ(backdrop.0));

                    if let Some(state) = state.as_ref() {
                        let old_brush = SelectObject(hdc, GetStockObject(NULL_BRUSH));
                        for ring in &state.rings {
                            let pen = CreatePen(PS_SOLID, ring.pen_width, rgb(ring.color));
                            let old_pen = SelectObject(hdc, HGDIOBJ(pen.0));
                            let e = ring.edges;
                            let _ = RoundRect(
                                hdc,
                                e.left,
                                e.top,
                                e.right,
                                e.bottom,
                                CORNER_RADIUS * 2,
                                CORNER_RADIUS * 2,
                            );
                            SelectObject(hdc, old_pen);
                            let _ = DeleteObject(HGDIOBJ(pen.0));
                        }
                        SelectObject(hdc, old_brush);

                        SetBkMode(hdc, TRANSPARENT);
                        SetTextColor(hdc, rgb((255, 255, 255)));
                        let text: Vec<u16> = CAPTION.encode_utf16().collect();
                        let (x, y) = state.caption_at;
                        let _ = TextOutW(hdc, x, y, &text);
                    }

                    let _ = EndPaint(hwnd, &ps);
                    LRESULT(0)
                }
                WM_TIMER if wparam.0 == DISMISS_TIMER_ID => {
                    let _ = KillTimer(hwnd, DISMISS_TIMER_ID);
                    let _ = DestroyWindow(hwnd);
                    LRESULT(0)
                }
                WM_DESTROY => {
                    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut IndicatorState;
                    if !ptr.is_null() {
                        drop(Box::from_raw(ptr));
                    }
                    SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                    LRESULT(0)
                }
                _ => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> CaptureRect {
        CaptureRect {
            x: 700,
            y: 885,
            width: 580,
            height: 27,
        }
    }

    #[test]
    fn test_rings_go_from_outermost_to_outline() {
        let rings = glow_rings(zone());

        assert_eq!(rings.len(), 6);
        let widths: Vec<i32> = rings.iter().map(|r| r.pen_width).collect();
        assert_eq!(widths, vec![5, 4, 3, 2, 1, 2]);

        assert_eq!(
            rings[0].edges,
            Edges {
                left: 695,
                top: 880,
                right: 1285,
                bottom: 917
            }
        );
        assert_eq!(
            rings[5].edges,
            Edges {
                left: 700,
                top: 885,
                right: 1280,
                bottom: 912
            }
        );
    }

    #[test]
    fn test_glow_intensity_rises_inward() {
        let rings = glow_rings(zone());

        // 20 * (6 - 5) = 20 for the outermost ring
        assert_eq!(rings[0].color, (0, 20, 10));
        // 20 * (6 - 1) = 100 for the innermost ring
        assert_eq!(rings[4].color, (0, 100, 50));
        assert_eq!(rings[5].color, (0, 200, 100));

        for pair in rings[..5].windows(2) {
            assert!(pair[0].color.1 < pair[1].color.1);
        }
    }

    #[test]
    fn test_glow_color_extremes() {
        assert_eq!(glow_color(0), (0, 0, 0));
        assert_eq!(glow_color(255), GLOW_COLOR);
    }

    #[test]
    fn test_caption_sits_above_zone() {
        assert_eq!(caption_origin(zone()), (700, 865));
    }
}
