//! Win32 overlay windows: layered, top-most, click-through popups that
//! stretch the map image over a dark background with a rounded border.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::sync::Once;

use windows::core::w;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreatePen, CreateSolidBrush, DeleteObject, EndPaint, FillRect, GetStockObject,
    InvalidateRect, RoundRect, SelectObject, SetStretchBltMode, StretchDIBits, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HALFTONE, HGDIOBJ, NULL_BRUSH, PAINTSTRUCT,
    PS_SOLID, SRCCOPY,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetClientRect, GetSystemMetrics,
    GetWindowLongPtrW, RegisterClassW, SetLayeredWindowAttributes, SetWindowLongPtrW,
    SetWindowPos, ShowWindow, SystemParametersInfoW, GWLP_USERDATA, HWND_TOPMOST, LWA_ALPHA,
    SM_CXSCREEN, SPI_GETWORKAREA, SWP_NOACTIVATE, SW_SHOWNOACTIVATE,
    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, WM_ERASEBKGND, WM_PAINT, WNDCLASSW, WS_EX_LAYERED,
    WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

use super::{opacity_alpha, rgba_to_bgra, OverlayHost, OverlayRect, OverlaySurface};

const BACKGROUND: COLORREF = COLORREF(0x00141414); // (20, 20, 20)
const BORDER: COLORREF = COLORREF(0x003E700C); // (12, 112, 62)
const BORDER_WIDTH: i32 = 2;
const BORDER_RADIUS: i32 = 8;

static REGISTER_CLASS: Once = Once::new();

/// Pixels painted by the window procedure.
#[derive(Default)]
struct PaintState {
    image: Option<DibImage>,
}

struct DibImage {
    width: i32,
    height: i32,
    bgra: Vec<u8>,
}

/// Creates overlay windows on the primary screen.
#[derive(Default)]
pub struct Win32OverlayHost;

impl OverlayHost for Win32OverlayHost {
    type Surface = Win32Overlay;

    fn screen_width(&self) -> i32 {
        work_area_width()
    }

    fn create(&mut self, bounds: OverlayRect, opacity_percent: u8) -> Result<Win32Overlay> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;
            let class_name = w!("MapOverlayWindow");

            REGISTER_CLASS.call_once(|| {
                let wc = WNDCLASSW {
                    lpfnWndProc: Some(overlay_proc),
                    hInstance: hinstance.into(),
                    lpszClassName: class_name,
                    ..Default::default()
                };
                if RegisterClassW(&wc) == 0 {
                    crate::log("Failed to register overlay window class");
                }
            });

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                class_name,
                w!("Map Overlay"),
                WS_POPUP,
                bounds.x,
                bounds.y,
                bounds.width as i32,
                bounds.height as i32,
                None,
                None,
                hinstance,
                None,
            )
            .map_err(|e| anyhow!("CreateWindowExW failed: {}", e))?;

            let mut state = Box::new(PaintState::default());
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, &mut *state as *mut PaintState as isize);

            let mut overlay = Win32Overlay { hwnd, state };
            overlay.set_opacity(opacity_percent);
            Ok(overlay)
        }
    }
}

/// A live overlay window. Dropping it destroys the window.
pub struct Win32Overlay {
    hwnd: HWND,
    state: Box<PaintState>,
}

impl OverlaySurface for Win32Overlay {
    fn set_bounds(&mut self, bounds: OverlayRect) {
        unsafe {
            if let Err(e) = SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                bounds.x,
                bounds.y,
                bounds.width as i32,
                bounds.height as i32,
                SWP_NOACTIVATE,
            ) {
                crate::log(&format!("Failed to move overlay: {}", e));
            }
            let _ = InvalidateRect(self.hwnd, None, true);
        }
    }

    fn set_opacity(&mut self, percent: u8) {
        unsafe {
            if let Err(e) =
                SetLayeredWindowAttributes(self.hwnd, COLORREF(0), opacity_alpha(percent), LWA_ALPHA)
            {
                crate::log(&format!("Failed to set overlay opacity: {}", e));
            }
        }
    }

    fn set_image(&mut self, image: RgbaImage) {
        let (width, height) = image.dimensions();
        self.state.image = Some(DibImage {
            width: width as i32,
            height: height as i32,
            bgra: rgba_to_bgra(&image),
        });
        unsafe {
            let _ = InvalidateRect(self.hwnd, None, true);
        }
    }

    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
        }
    }
}

impl Drop for Win32Overlay {
    fn drop(&mut self) {
        unsafe {
            SetWindowLongPtrW(self.hwnd, GWLP_USERDATA, 0);
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

/// Width of the primary work area (excluding the taskbar), falling back to
/// the full screen width.
fn work_area_width() -> i32 {
    let mut rect = RECT::default();
    unsafe {
        match SystemParametersInfoW(
            SPI_GETWORKAREA,
            0,
            Some(&mut rect as *mut RECT as *mut _),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        ) {
            Ok(()) => rect.right - rect.left,
            Err(_) => GetSystemMetrics(SM_CXSCREEN),
        }
    }
}

unsafe extern "system" fn overlay_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        match msg {
            // Painted in full by WM_PAINT
            WM_ERASEBKGND => LRESULT(1),
            WM_PAINT => {
                let state = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const PaintState;
                let mut ps = PAINTSTRUCT::default();
                let hdc = BeginPaint(hwnd, &mut ps);

                let mut client = RECT::default();
                let _ = GetClientRect(hwnd, &mut client);

                let background = CreateSolidBrush(BACKGROUND);
                FillRect(hdc, &client, background);
                let _ = DeleteObject(HGDIOBJ(background.0));

                if let Some(image) = state.as_ref().and_then(|s| s.image.as_ref()) {
                    let bmi = BITMAPINFO {
                        bmiHeader: BITMAPINFOHEADER {
                            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                            biWidth: image.width,
                            biHeight: -image.height, // top-down
                            biPlanes: 1,
                            biBitCount: 32,
                            biCompression: BI_RGB.0,
                            ..Default::default()
                        },
                        ..Default::default()
                    };
                    SetStretchBltMode(hdc, HALFTONE);
                    StretchDIBits(
                        hdc,
                        0,
                        0,
                        client.right - client.left,
                        client.bottom - client.top,
                        0,
                        0,
                        image.width,
                        image.height,
                        Some(image.bgra.as_ptr() as *const _),
                        &bmi,
                        DIB_RGB_COLORS,
                        SRCCOPY,
                    );
                }

                let pen = CreatePen(PS_SOLID, BORDER_WIDTH, BORDER);
                let old_pen = SelectObject(hdc, HGDIOBJ(pen.0));
                let old_brush = SelectObject(hdc, GetStockObject(NULL_BRUSH));
                let _ = RoundRect(
                    hdc,
                    client.left,
                    client.top,
                    client.right,
                    client.bottom,
                    BORDER_RADIUS * 2,
                    BORDER_RADIUS * 2,
                );
                SelectObject(hdc, old_brush);
                SelectObject(hdc, old_pen);
                let _ = DeleteObject(HGDIOBJ(pen.0));

                let _ = EndPaint(hwnd, &ps);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
