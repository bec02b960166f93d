//! Translation of hotkeys and tray menu picks into session commands.
//!
//! The tray context menu carries the overlay settings (opacity, size,
//! position), so it is described here as plain data and rendered by the tray.

use crate::config::HotkeyConfig;
use crate::overlay::{Anchor, OverlaySettings};
use crate::session::Command;

pub const HOTKEY_DETECT: i32 = 1;
pub const HOTKEY_CYCLE: i32 = 2;
pub const HOTKEY_CLOSE: i32 = 3;

// Menu item IDs
pub const MENU_DETECT: usize = 1001;
pub const MENU_CYCLE: usize = 1002;
pub const MENU_CLOSE: usize = 1003;
pub const MENU_EXIT: usize = 1004;
const MENU_OPACITY_BASE: usize = 2000;
const MENU_SIZE_BASE: usize = 3000;
const MENU_ANCHOR_BASE: usize = 4000;

pub const OPACITY_STEPS: [u8; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
pub const SIZE_STEPS: [u16; 16] = [
    50, 60, 70, 80, 90, 100, 110, 120, 130, 140, 150, 160, 170, 180, 190, 200,
];

/// A global hotkey to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub id: i32,
    /// Virtual-key code, registered without modifiers
    pub vk: u32,
    pub command: Command,
}

/// The three hotkeys, in registration order.
pub fn hotkeys(config: &HotkeyConfig) -> [Hotkey; 3] {
    [
        Hotkey {
            id: HOTKEY_DETECT,
            vk: config.detect,
            command: Command::TriggerDetect,
        },
        Hotkey {
            id: HOTKEY_CYCLE,
            vk: config.cycle,
            command: Command::CycleVariant,
        },
        Hotkey {
            id: HOTKEY_CLOSE,
            vk: config.close,
            command: Command::CloseOverlay,
        },
    ]
}

pub fn command_for_hotkey(id: i32) -> Option<Command> {
    match id {
        HOTKEY_DETECT => Some(Command::TriggerDetect),
        HOTKEY_CYCLE => Some(Command::CycleVariant),
        HOTKEY_CLOSE => Some(Command::CloseOverlay),
        _ => None,
    }
}

/// Display name of a virtual-key code.
pub fn key_name(vk: u32) -> String {
    match vk {
        0x70..=0x87 => format!("F{}", vk - 0x6F),
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(vk).map_or_else(String::new, String::from),
        _ => format!("VK 0x{:02X}", vk),
    }
}

/// What a tray menu pick asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Command(Command),
    Exit,
}

pub fn menu_action(id: usize) -> Option<MenuAction> {
    match id {
        MENU_DETECT => Some(MenuAction::Command(Command::TriggerDetect)),
        MENU_CYCLE => Some(MenuAction::Command(Command::CycleVariant)),
        MENU_CLOSE => Some(MenuAction::Command(Command::CloseOverlay)),
        MENU_EXIT => Some(MenuAction::Exit),
        _ => {
            if let Some(&pct) = OPACITY_STEPS.iter().find(|&&p| opacity_menu_id(p) == id) {
                Some(MenuAction::Command(Command::SetOpacity(pct)))
            } else if let Some(&pct) = SIZE_STEPS.iter().find(|&&p| size_menu_id(p) == id) {
                Some(MenuAction::Command(Command::SetSize(pct)))
            } else {
                Anchor::ALL
                    .iter()
                    .find(|&&a| anchor_menu_id(a) == id)
                    .map(|&a| MenuAction::Command(Command::SetAnchor(a)))
            }
        }
    }
}

pub fn opacity_menu_id(percent: u8) -> usize {
    MENU_OPACITY_BASE + percent as usize
}

pub fn size_menu_id(percent: u16) -> usize {
    MENU_SIZE_BASE + percent as usize
}

pub fn anchor_menu_id(anchor: Anchor) -> usize {
    let index = Anchor::ALL.iter().position(|&a| a == anchor).unwrap_or(0);
    MENU_ANCHOR_BASE + index
}

/// One entry of the tray context menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Action {
        id: usize,
        label: String,
    },
    Choice {
        id: usize,
        label: String,
        checked: bool,
    },
    Submenu {
        label: String,
        items: Vec<MenuItem>,
    },
    Separator,
}

/// Builds the tray menu for the current settings, top to bottom.
pub fn tray_menu(settings: OverlaySettings, keys: &HotkeyConfig) -> Vec<MenuItem> {
    let opacity = OPACITY_STEPS
        .iter()
        .map(|&pct| MenuItem::Choice {
            id: opacity_menu_id(pct),
            label: format!("{}%", pct),
            checked: pct == settings.opacity_percent,
        })
        .collect();

    let size = SIZE_STEPS
        .iter()
        .map(|&pct| MenuItem::Choice {
            id: size_menu_id(pct),
            label: format!("{}%", pct),
            checked: pct == settings.size_percent,
        })
        .collect();

    let position = Anchor::ALL
        .iter()
        .map(|&anchor| MenuItem::Choice {
            id: anchor_menu_id(anchor),
            label: anchor.to_string(),
            checked: anchor == settings.anchor,
        })
        .collect();

    vec![
        MenuItem::Action {
            id: MENU_DETECT,
            label: format!("Detect map\t{}", key_name(keys.detect)),
        },
        MenuItem::Action {
            id: MENU_CYCLE,
            label: format!("Next variant\t{}", key_name(keys.cycle)),
        },
        MenuItem::Action {
            id: MENU_CLOSE,
            label: format!("Close overlay\t{}", key_name(keys.close)),
        },
        MenuItem::Separator,
        MenuItem::Submenu {
            label: format!("Opacity: {}%", settings.opacity_percent),
            items: opacity,
        },
        MenuItem::Submenu {
            label: format!("Size: {}%", settings.size_percent),
            items: size,
        },
        MenuItem::Submenu {
            label: "Position".to_string(),
            items: position,
        },
        MenuItem::Separator,
        MenuItem::Action {
            id: MENU_EXIT,
            label: "Exit".to_string(),
        },
    ]
}
