//! System tray shell: hidden message window, tray icon, global hotkeys and
//! the message loop that feeds the session.
//!
//! The window procedure only queues inputs. They are handled by the loop,
//! after dispatch returns, so hotkeys and menu picks share one path into
//! [`Session::handle`].

use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::VecDeque;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, UnregisterHotKey, MOD_NOREPEAT};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    DispatchMessageW, GetCursorPos, GetMessageW, LoadIconW, PostMessageW, PostQuitMessage,
    RegisterClassW, SetForegroundWindow, TrackPopupMenu, TranslateMessage, CW_USEDEFAULT, HMENU,
    IDI_APPLICATION, MF_CHECKED, MF_POPUP, MF_SEPARATOR, MF_STRING, MF_UNCHECKED, MSG,
    TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RETURNCMD, TPM_RIGHTBUTTON, WM_DESTROY, WM_HOTKEY,
    WM_NULL, WM_RBUTTONUP, WM_USER, WNDCLASSW, WS_OVERLAPPEDWINDOW,
};

use crate::config::HotkeyConfig;
use crate::input::{self, Hotkey, MenuAction, MenuItem};
use crate::log;
use crate::overlay::OverlayHost;
use crate::session::{MapNameSource, Session};

const WM_TRAYICON: u32 = WM_USER + 1;
const TRAY_ICON_ID: u32 = 1;

/// Something the user did, waiting to be handled by the loop.
enum Input {
    Hotkey(i32),
    TrayMenu,
}

thread_local! {
    static INPUTS: RefCell<VecDeque<Input>> = RefCell::new(VecDeque::new());
}

fn push_input(input: Input) {
    INPUTS.with(|q| q.borrow_mut().push_back(input));
}

fn pop_input() -> Option<Input> {
    INPUTS.with(|q| q.borrow_mut().pop_front())
}

/// Runs the tray application until Exit is picked.
pub fn run<D: MapNameSource, H: OverlayHost>(
    session: &mut Session<D, H>,
    keys: &HotkeyConfig,
) -> Result<()> {
    let hwnd = create_message_window()?;

    let tip = format!(
        "Map Overlay ({} detect, {} next, {} close)",
        input::key_name(keys.detect),
        input::key_name(keys.cycle),
        input::key_name(keys.close)
    );
    let tray_added = match add_tray_icon(hwnd, &tip) {
        Ok(()) => true,
        Err(e) => {
            log(&format!("Failed to add tray icon: {}", e));
            false
        }
    };

    let registered = register_hotkeys(hwnd, &input::hotkeys(keys));

    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);

            while let Some(pending) = pop_input() {
                match pending {
                    Input::Hotkey(id) => {
                        if let Some(command) = input::command_for_hotkey(id) {
                            session.handle(command);
                        }
                    }
                    Input::TrayMenu => {
                        let items = input::tray_menu(session.settings(), keys);
                        match show_context_menu(hwnd, &items).and_then(input::menu_action) {
                            Some(MenuAction::Command(command)) => session.handle(command),
                            Some(MenuAction::Exit) => {
                                log("Exit requested");
                                PostQuitMessage(0);
                            }
                            None => {}
                        }
                    }
                }
            }
        }

        // Cleanup
        for hotkey in &registered {
            let _ = UnregisterHotKey(hwnd, hotkey.id);
        }
        if tray_added {
            remove_tray_icon(hwnd);
        }
        let _ = DestroyWindow(hwnd);
    }

    Ok(())
}

/// Registers each hotkey, logging the ones that are taken. Returns the
/// registered ones.
fn register_hotkeys(hwnd: HWND, hotkeys: &[Hotkey]) -> Vec<Hotkey> {
    let mut registered = Vec::new();
    for hotkey in hotkeys {
        match unsafe { RegisterHotKey(hwnd, hotkey.id, MOD_NOREPEAT, hotkey.vk) } {
            Ok(()) => registered.push(*hotkey),
            Err(e) => log(&format!(
                "Failed to register hotkey {}: {}",
                input::key_name(hotkey.vk),
                e
            )),
        }
    }
    registered
}

fn create_message_window() -> Result<HWND> {
    unsafe {
        let hinstance = GetModuleHandleW(None)?;
        let class_name = w!("MapOverlayTrayClass");

        let wc = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: hinstance.into(),
            lpszClassName: class_name,
            ..Default::default()
        };

        let atom = RegisterClassW(&wc);
        if atom == 0 {
            return Err(anyhow!("Failed to register window class"));
        }

        let hwnd = CreateWindowExW(
            Default::default(),
            class_name,
            w!("Map Overlay"),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            None,
            None,
            hinstance,
            None,
        )?;

        Ok(hwnd)
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        match msg {
            WM_HOTKEY => {
                push_input(Input::Hotkey(wparam.0 as i32));
                LRESULT(0)
            }
            WM_TRAYICON => {
                let event = (lparam.0 & 0xFFFF) as u32;
                if event == WM_RBUTTONUP {
                    push_input(Input::TrayMenu);
                }
                LRESULT(0)
            }
            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

fn add_tray_icon(hwnd: HWND, tip: &str) -> Result<()> {
    unsafe {
        let mut nid = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: hwnd,
            uID: TRAY_ICON_ID,
            uFlags: NIF_ICON | NIF_MESSAGE | NIF_TIP,
            uCallbackMessage: WM_TRAYICON,
            hIcon: LoadIconW(None, IDI_APPLICATION)?,
            ..Default::default()
        };

        // Tooltip, truncated to fit and kept null-terminated
        let tip_wide: Vec<u16> = tip.encode_utf16().collect();
        let len = tip_wide.len().min(nid.szTip.len() - 1);
        nid.szTip[..len].copy_from_slice(&tip_wide[..len]);

        if !Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
            return Err(anyhow!("Shell_NotifyIconW(NIM_ADD) failed"));
        }

        Ok(())
    }
}

fn remove_tray_icon(hwnd: HWND) {
    unsafe {
        let nid = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: hwnd,
            uID: TRAY_ICON_ID,
            ..Default::default()
        };
        let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
    }
}

/// Shows the context menu at the cursor and returns the picked item id.
fn show_context_menu(hwnd: HWND, items: &[MenuItem]) -> Option<usize> {
    unsafe {
        let menu = match CreatePopupMenu() {
            Ok(menu) => menu,
            Err(e) => {
                log(&format!("Failed to create tray menu: {}", e));
                return None;
            }
        };

        if let Err(e) = append_items(menu, items) {
            log(&format!("Failed to build tray menu: {}", e));
            let _ = DestroyMenu(menu);
            return None;
        }

        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);

        // Required for the menu to close when clicking elsewhere
        let _ = SetForegroundWindow(hwnd);

        let picked = TrackPopupMenu(
            menu,
            TPM_BOTTOMALIGN | TPM_LEFTALIGN | TPM_RIGHTBUTTON | TPM_RETURNCMD,
            pt.x,
            pt.y,
            0,
            hwnd,
            None,
        );
        let _ = PostMessageW(hwnd, WM_NULL, WPARAM(0), LPARAM(0));

        // Destroys the submenus too
        let _ = DestroyMenu(menu);

        match picked.0 {
            0 => None,
            id => Some(id as usize),
        }
    }
}

fn append_items(menu: HMENU, items: &[MenuItem]) -> Result<()> {
    unsafe {
        for item in items {
            match item {
                MenuItem::Action { id, label } => {
                    let text = wide(label);
                    AppendMenuW(menu, MF_STRING, *id, PCWSTR(text.as_ptr()))?;
                }
                MenuItem::Choice { id, label, checked } => {
                    let text = wide(label);
                    let check = if *checked { MF_CHECKED } else { MF_UNCHECKED };
                    AppendMenuW(menu, MF_STRING | check, *id, PCWSTR(text.as_ptr()))?;
                }
                MenuItem::Submenu { label, items } => {
                    let submenu = CreatePopupMenu()?;
                    if let Err(e) = append_items(submenu, items) {
                        let _ = DestroyMenu(submenu);
                        return Err(e);
                    }
                    let text = wide(label);
                    AppendMenuW(menu, MF_POPUP, submenu.0 as usize, PCWSTR(text.as_ptr()))?;
                }
                MenuItem::Separator => {
                    AppendMenuW(menu, MF_SEPARATOR, 0, None)?;
                }
            }
        }
    }
    Ok(())
}

/// Null-terminated UTF-16 copy of `s`.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
