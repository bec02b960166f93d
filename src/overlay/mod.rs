//! Result overlay: a borderless, top-most, click-through window showing the
//! map image for the detected name.
//!
//! [`OverlayPresenter`] owns the single overlay and its settings. Windows are
//! created through an [`OverlayHost`], so the state machine runs without a
//! display in tests.

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::config::OverlayDefaults;
use crate::maps::VariantSet;

#[cfg(windows)]
pub mod window;

#[cfg(windows)]
pub use window::Win32OverlayHost;

pub const MIN_OPACITY: u8 = 10;
pub const MAX_OPACITY: u8 = 100;
pub const MIN_SIZE: u16 = 50;
pub const MAX_SIZE: u16 = 200;

/// Where the overlay sits along the top edge of the work area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
}

impl Anchor {
    pub const ALL: [Anchor; 3] = [Anchor::TopLeft, Anchor::TopCenter, Anchor::TopRight];
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::TopLeft => write!(f, "Top Left"),
            Anchor::TopCenter => write!(f, "Top Center"),
            Anchor::TopRight => write!(f, "Top Right"),
        }
    }
}

/// User-adjustable presentation settings, applied to the live overlay and
/// remembered for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySettings {
    pub opacity_percent: u8,
    pub size_percent: u16,
    pub anchor: Anchor,
}

impl From<&OverlayDefaults> for OverlaySettings {
    fn from(defaults: &OverlayDefaults) -> Self {
        Self {
            opacity_percent: defaults.opacity_percent.clamp(MIN_OPACITY, MAX_OPACITY),
            size_percent: defaults.size_percent.clamp(MIN_SIZE, MAX_SIZE),
            anchor: defaults.anchor,
        }
    }
}

/// Fixed geometry of the overlay at 100% size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayGeometry {
    pub base_width: u32,
    pub base_height: u32,
    /// Distance from the top edge, and from the side edge for left/right anchors
    pub margin: i32,
}

impl From<&OverlayDefaults> for OverlayGeometry {
    fn from(defaults: &OverlayDefaults) -> Self {
        Self {
            base_width: defaults.base_width,
            base_height: defaults.base_height,
            margin: defaults.margin,
        }
    }
}

/// Window bounds in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Computes the overlay bounds for a size and anchor.
pub fn overlay_bounds(
    geometry: OverlayGeometry,
    size_percent: u16,
    anchor: Anchor,
    screen_width: i32,
) -> OverlayRect {
    let width = geometry.base_width * size_percent as u32 / 100;
    let height = geometry.base_height * size_percent as u32 / 100;

    let x = match anchor {
        Anchor::TopLeft => geometry.margin,
        Anchor::TopCenter => (screen_width - width as i32) / 2,
        Anchor::TopRight => screen_width - width as i32 - geometry.margin,
    };

    OverlayRect {
        x,
        y: geometry.margin,
        width,
        height,
    }
}

/// A created overlay window. Dropping it destroys the window.
pub trait OverlaySurface {
    fn set_bounds(&mut self, bounds: OverlayRect);
    fn set_opacity(&mut self, percent: u8);
    fn set_image(&mut self, image: RgbaImage);
    fn show(&mut self);
}

/// Creates overlay windows.
pub trait OverlayHost {
    type Surface: OverlaySurface;

    /// Width of the primary work area.
    fn screen_width(&self) -> i32;

    fn create(&mut self, bounds: OverlayRect, opacity_percent: u8) -> Result<Self::Surface>;
}

struct ActiveOverlay<S> {
    surface: S,
    variants: VariantSet,
    index: usize,
}

/// Owns at most one overlay at a time.
pub struct OverlayPresenter<H: OverlayHost> {
    host: H,
    geometry: OverlayGeometry,
    settings: OverlaySettings,
    active: Option<ActiveOverlay<H::Surface>>,
}

impl<H: OverlayHost> OverlayPresenter<H> {
    pub fn new(host: H, geometry: OverlayGeometry, settings: OverlaySettings) -> Self {
        Self {
            host,
            geometry,
            settings,
            active: None,
        }
    }

    pub fn settings(&self) -> OverlaySettings {
        self.settings
    }

    pub fn is_shown(&self) -> bool {
        self.active.is_some()
    }

    /// Index of the displayed variant, `None` while closed.
    pub fn current_index(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.index)
    }

    pub fn variant_count(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.variants.len())
    }

    /// Replaces any current overlay with one showing the first variant.
    ///
    /// An empty set leaves the current state untouched.
    pub fn show(&mut self, variants: VariantSet) {
        if variants.is_empty() {
            return;
        }

        self.close();

        let bounds = self.bounds();
        let mut surface = match self.host.create(bounds, self.settings.opacity_percent) {
            Ok(surface) => surface,
            Err(e) => {
                crate::log(&format!("Failed to create overlay window: {}", e));
                return;
            }
        };

        if let Some(first) = variants.get(0) {
            match load_image(first) {
                Ok(image) => surface.set_image(image),
                Err(e) => crate::log(&format!("{:#}", e)),
            }
        }
        surface.show();

        self.active = Some(ActiveOverlay {
            surface,
            variants,
            index: 0,
        });
        crate::log("Map overlay shown (click-through), stays until closed.");
    }

    /// Advances to the next variant, wrapping around.
    ///
    /// Does nothing unless an overlay with more than one variant is shown.
    pub fn cycle(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let count = active.variants.len();
        if count <= 1 {
            return;
        }

        active.index = (active.index + 1) % count;
        let Some(path) = active.variants.get(active.index) else {
            return;
        };

        match load_image(path) {
            Ok(image) => {
                active.surface.set_image(image);
                crate::log(&format!("Variant {}/{} displayed.", active.index + 1, count));
            }
            Err(e) => crate::log(&format!("{:#}", e)),
        }
    }

    /// Destroys the overlay, if any.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            drop(active.surface);
            crate::log("Map overlay closed.");
        }
    }

    pub fn set_opacity(&mut self, percent: u8) {
        let percent = percent.clamp(MIN_OPACITY, MAX_OPACITY);
        self.settings.opacity_percent = percent;

        if let Some(active) = self.active.as_mut() {
            active.surface.set_opacity(percent);
            crate::log(&format!("Opacity adjusted to {}%", percent));
        }
    }

    pub fn set_size(&mut self, percent: u16) {
        let percent = percent.clamp(MIN_SIZE, MAX_SIZE);
        self.settings.size_percent = percent;

        let bounds = self.bounds();
        if let Some(active) = self.active.as_mut() {
            active.surface.set_bounds(bounds);
            crate::log(&format!(
                "Size adjusted to {}% ({}x{})",
                percent, bounds.width, bounds.height
            ));
        }
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.settings.anchor = anchor;
        crate::log(&format!("Position changed: {}", anchor));

        let bounds = self.bounds();
        if let Some(active) = self.active.as_mut() {
            active.surface.set_bounds(bounds);
        }
    }

    fn bounds(&self) -> OverlayRect {
        overlay_bounds(
            self.geometry,
            self.settings.size_percent,
            self.settings.anchor,
            self.host.screen_width(),
        )
    }
}

/// Decodes an image fully into memory; no file handle outlives the call.
fn load_image(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("Error loading image {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Layered-window alpha for an opacity percentage.
pub fn opacity_alpha(percent: u8) -> u8 {
    (percent.min(MAX_OPACITY) as u32 * 255 / 100) as u8
}

/// Converts RGBA pixels to the BGRA byte order of a 32-bit DIB.
pub fn rgba_to_bgra(image: &RgbaImage) -> Vec<u8> {
    let mut bgra = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        bgra.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
    }
    bgra
}
