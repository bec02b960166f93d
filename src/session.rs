//! Detection session: one handler for every user command.
//!
//! Hotkeys and tray menu picks are turned into [`Command`]s and fed to
//! [`Session::handle`] one at a time on the UI thread.

use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::capture::{CaptureRect, ScreenCapturer};
use crate::log;
use crate::maps::{MapKey, MapLibrary};
use crate::ocr::{enhance_for_ocr, recognize_best, RecognizerFactory};
use crate::overlay::{Anchor, OverlayHost, OverlayPresenter, OverlaySettings};

/// Everything the user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TriggerDetect,
    CloseOverlay,
    CycleVariant,
    SetOpacity(u8),
    SetSize(u16),
    SetAnchor(Anchor),
}

/// Produces the map name currently on screen, if any.
pub trait MapNameSource {
    fn detect(&mut self) -> Option<String>;
}

/// Reads the map name from the capture zone with OCR.
pub struct OcrDetector<C, F> {
    capturer: C,
    factory: F,
    zone: CaptureRect,
    /// Where captures without text are saved, when enabled
    debug_dir: Option<PathBuf>,
}

impl<C: ScreenCapturer, F: RecognizerFactory> OcrDetector<C, F> {
    pub fn new(capturer: C, factory: F, zone: CaptureRect, debug_dir: Option<PathBuf>) -> Self {
        Self {
            capturer,
            factory,
            zone,
            debug_dir,
        }
    }
}

impl<C: ScreenCapturer, F: RecognizerFactory> MapNameSource for OcrDetector<C, F> {
    fn detect(&mut self) -> Option<String> {
        let capture = match self.capturer.capture(self.zone) {
            Ok(img) => img,
            Err(e) => {
                log(&format!("Capture failed: {:#}", e));
                return None;
            }
        };
        self.capturer.show_capture_zone(self.zone);

        let best = {
            let mut engine = match self.factory.open() {
                Ok(engine) => engine,
                Err(e) => {
                    log(&format!("OCR engine unavailable: {:#}", e));
                    return None;
                }
            };
            recognize_best(&capture, &mut engine)
        };

        match best {
            Some(attempt) => {
                log(&format!(
                    "Best OCR result: \"{}\" (confidence: {:.2}%)",
                    attempt.text,
                    attempt.confidence * 100.0
                ));
                Some(attempt.text)
            }
            None => {
                if let Some(dir) = &self.debug_dir {
                    match save_debug_snapshot(dir, &capture) {
                        Ok(path) => log(&format!("Saved capture for inspection: {}", path.display())),
                        Err(e) => log(&format!("Could not save debug capture: {:#}", e)),
                    }
                }
                None
            }
        }
    }
}

/// Saves the raw capture and its binarized form side by side.
///
/// Returns the path of the raw capture.
fn save_debug_snapshot(dir: &Path, capture: &RgbImage) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let raw = dir.join(format!("capture_{}.png", timestamp));
    let enhanced = dir.join(format!("capture_{}_enhanced.png", timestamp));

    capture
        .save(&raw)
        .with_context(|| format!("Failed to write {}", raw.display()))?;
    enhance_for_ocr(capture)
        .save(&enhanced)
        .with_context(|| format!("Failed to write {}", enhanced.display()))?;

    Ok(raw)
}

/// Ties detection, map lookup and the overlay together.
pub struct Session<D: MapNameSource, H: OverlayHost> {
    detector: D,
    library: MapLibrary,
    presenter: OverlayPresenter<H>,
    detecting: bool,
}

impl<D: MapNameSource, H: OverlayHost> Session<D, H> {
    pub fn new(detector: D, library: MapLibrary, presenter: OverlayPresenter<H>) -> Self {
        Self {
            detector,
            library,
            presenter,
            detecting: false,
        }
    }

    pub fn settings(&self) -> OverlaySettings {
        self.presenter.settings()
    }

    pub fn presenter(&self) -> &OverlayPresenter<H> {
        &self.presenter
    }

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::TriggerDetect => self.detect(),
            Command::CloseOverlay => self.presenter.close(),
            Command::CycleVariant => self.presenter.cycle(),
            Command::SetOpacity(percent) => self.presenter.set_opacity(percent),
            Command::SetSize(percent) => self.presenter.set_size(percent),
            Command::SetAnchor(anchor) => self.presenter.set_anchor(anchor),
        }
    }

    fn detect(&mut self) {
        if self.detecting {
            log("Detection already in progress, request ignored.");
            return;
        }

        self.detecting = true;
        self.run_detection();
        self.detecting = false;
    }

    fn run_detection(&mut self) {
        log("Detecting map...");

        let Some(text) = self.detector.detect() else {
            log("No text detected.");
            return;
        };

        let Some(key) = MapKey::from_text(&text) else {
            log(&format!("No usable characters in \"{}\".", text));
            return;
        };
        log(&format!("Sanitized name: {}", key.as_str()));

        let variants = self.library.resolve(&key);
        if variants.is_empty() {
            log(&format!("Image not found for: {}", key.as_str()));
            return;
        }

        log(&format!("Image(s) found: {}", variants.len()));
        self.presenter.show(variants);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::{OcrAttempt, Recognizer};
    use crate::overlay::{OverlayGeometry, OverlayRect, OverlaySurface};
    use anyhow::anyhow;
    use image::{Rgb, RgbaImage};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    // ---- overlay fakes ----

    #[derive(Default)]
    struct HostLog {
        created: usize,
        destroyed: usize,
        images: usize,
    }

    struct FakeSurface(Rc<RefCell<HostLog>>);

    impl OverlaySurface for FakeSurface {
        fn set_bounds(&mut self, _bounds: OverlayRect) {}
        fn set_opacity(&mut self, _percent: u8) {}
        fn set_image(&mut self, _image: RgbaImage) {
            self.0.borrow_mut().images += 1;
        }
        fn show(&mut self) {}
    }

    impl Drop for FakeSurface {
        fn drop(&mut self) {
            self.0.borrow_mut().destroyed += 1;
        }
    }

    struct FakeHost(Rc<RefCell<HostLog>>);

    impl OverlayHost for FakeHost {
        type Surface = FakeSurface;

        fn screen_width(&self) -> i32 {
            1920
        }

        fn create(&mut self, _bounds: OverlayRect, _opacity: u8) -> Result<FakeSurface> {
            self.0.borrow_mut().created += 1;
            Ok(FakeSurface(self.0.clone()))
        }
    }

    fn presenter(log: &Rc<RefCell<HostLog>>) -> OverlayPresenter<FakeHost> {
        OverlayPresenter::new(
            FakeHost(log.clone()),
            OverlayGeometry {
                base_width: 420,
                base_height: 380,
                margin: 20,
            },
            OverlaySettings {
                opacity_percent: 50,
                size_percent: 80,
                anchor: Anchor::TopLeft,
            },
        )
    }

    // ---- detector fakes ----

    struct ScriptedSource {
        answers: VecDeque<Option<String>>,
        calls: usize,
    }

    impl ScriptedSource {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.map(str::to_string)).collect(),
                calls: 0,
            }
        }
    }

    impl MapNameSource for ScriptedSource {
        fn detect(&mut self) -> Option<String> {
            self.calls += 1;
            self.answers.pop_front().flatten()
        }
    }

    struct FakeCapturer {
        fail: bool,
        indicator_shown: Rc<Cell<usize>>,
    }

    impl ScreenCapturer for FakeCapturer {
        fn capture(&self, rect: CaptureRect) -> Result<RgbImage> {
            if self.fail {
                return Err(anyhow!("screen locked"));
            }
            Ok(RgbImage::from_pixel(rect.width, rect.height, Rgb([200, 200, 200])))
        }

        fn show_capture_zone(&self, _rect: CaptureRect) {
            self.indicator_shown.set(self.indicator_shown.get() + 1);
        }
    }

    struct FixedRecognizer {
        text: &'static str,
        dropped: Rc<Cell<bool>>,
    }

    impl Recognizer for FixedRecognizer {
        fn recognize(&mut self, _image: &RgbImage) -> Result<OcrAttempt> {
            Ok(OcrAttempt {
                text: self.text.to_string(),
                confidence: 0.8,
            })
        }
    }

    impl Drop for FixedRecognizer {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    fn zone() -> CaptureRect {
        CaptureRect {
            x: 700,
            y: 885,
            width: 58,
            height: 10,
        }
    }

    // ---- fixtures ----

    fn maps_dir() -> TempDir {
        let dir = tempdir().unwrap();
        let solid = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        solid.save(dir.path().join("coaltower.jpg")).unwrap();
        std::fs::create_dir_all(dir.path().join("thegame")).unwrap();
        solid.save(dir.path().join("thegame").join("a.png")).unwrap();
        solid.save(dir.path().join("thegame").join("b.png")).unwrap();
        dir
    }

    fn session(
        maps: &TempDir,
        answers: &[Option<&str>],
        host_log: &Rc<RefCell<HostLog>>,
    ) -> Session<ScriptedSource, FakeHost> {
        Session::new(
            ScriptedSource::new(answers),
            MapLibrary::new(maps.path()),
            presenter(host_log),
        )
    }

    #[test]
    fn test_detect_shows_matching_variants() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("The Game")], &host_log);

        session.handle(Command::TriggerDetect);

        assert_eq!(session.presenter().current_index(), Some(0));
        assert_eq!(session.presenter().variant_count(), 2);

        session.handle(Command::CycleVariant);
        assert_eq!(session.presenter().current_index(), Some(1));
        session.handle(Command::CycleVariant);
        assert_eq!(session.presenter().current_index(), Some(0));
        assert_eq!(host_log.borrow().images, 3);
    }

    #[test]
    fn test_no_text_leaves_state_alone() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("Coal Tower"), None], &host_log);

        session.handle(Command::TriggerDetect);
        session.handle(Command::TriggerDetect);

        assert_eq!(session.presenter().variant_count(), 1);
        assert_eq!(host_log.borrow().created, 1);
        assert_eq!(host_log.borrow().destroyed, 0);
    }

    #[test]
    fn test_unknown_map_keeps_current_overlay() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("The Game"), Some("Nowhere Mall")], &host_log);

        session.handle(Command::TriggerDetect);
        session.handle(Command::TriggerDetect);

        assert_eq!(session.presenter().variant_count(), 2);
        assert_eq!(host_log.borrow().created, 1);
    }

    #[test]
    fn test_punctuation_only_text_is_a_miss() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("-- '' --")], &host_log);

        session.handle(Command::TriggerDetect);

        assert!(!session.presenter().is_shown());
    }

    #[test]
    fn test_new_detection_replaces_overlay() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("The Game"), Some("COAL TOWER!")], &host_log);

        session.handle(Command::TriggerDetect);
        session.handle(Command::CycleVariant);
        session.handle(Command::TriggerDetect);

        assert_eq!(session.presenter().current_index(), Some(0));
        assert_eq!(session.presenter().variant_count(), 1);
        assert_eq!(host_log.borrow().created, 2);
        assert_eq!(host_log.borrow().destroyed, 1);
    }

    #[test]
    fn test_close_and_settings_commands() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("Coal Tower")], &host_log);

        session.handle(Command::SetOpacity(70));
        session.handle(Command::SetSize(120));
        session.handle(Command::SetAnchor(Anchor::TopRight));
        session.handle(Command::TriggerDetect);
        session.handle(Command::CloseOverlay);
        session.handle(Command::CloseOverlay);

        let s = session.settings();
        assert_eq!(s.opacity_percent, 70);
        assert_eq!(s.size_percent, 120);
        assert_eq!(s.anchor, Anchor::TopRight);
        assert!(!session.presenter().is_shown());
        assert_eq!(host_log.borrow().destroyed, 1);
    }

    #[test]
    fn test_detection_in_flight_rejects_another() {
        let maps = maps_dir();
        let host_log = Rc::new(RefCell::new(HostLog::default()));
        let mut session = session(&maps, &[Some("Coal Tower")], &host_log);

        session.detecting = true;
        session.handle(Command::TriggerDetect);
        assert_eq!(session.detector.calls, 0);

        session.detecting = false;
        session.handle(Command::TriggerDetect);
        assert_eq!(session.detector.calls, 1);
        assert!(!session.detecting, "Flag cleared after detection");
    }

    #[test]
    fn test_ocr_detector_reads_text_and_releases_engine() {
        let indicator = Rc::new(Cell::new(0));
        let dropped = Rc::new(Cell::new(false));
        let dropped_in_factory = dropped.clone();

        let mut detector = OcrDetector::new(
            FakeCapturer {
                fail: false,
                indicator_shown: indicator.clone(),
            },
            move || -> Result<FixedRecognizer> {
                Ok(FixedRecognizer {
                    text: "  Coal Tower ",
                    dropped: dropped_in_factory.clone(),
                })
            },
            zone(),
            None,
        );

        assert_eq!(detector.detect().as_deref(), Some("Coal Tower"));
        assert_eq!(indicator.get(), 1);
        assert!(dropped.get(), "Engine released after detection");
    }

    #[test]
    fn test_ocr_detector_capture_failure() {
        let indicator = Rc::new(Cell::new(0));
        let opened = Rc::new(Cell::new(false));
        let opened_in_factory = opened.clone();

        let mut detector = OcrDetector::new(
            FakeCapturer {
                fail: true,
                indicator_shown: indicator.clone(),
            },
            move || -> Result<FixedRecognizer> {
                opened_in_factory.set(true);
                Err(anyhow!("unreachable"))
            },
            zone(),
            None,
        );

        assert_eq!(detector.detect(), None);
        assert_eq!(indicator.get(), 0);
        assert!(!opened.get(), "Engine never opened");
    }

    #[test]
    fn test_ocr_detector_engine_failure() {
        let mut detector = OcrDetector::new(
            FakeCapturer {
                fail: false,
                indicator_shown: Rc::new(Cell::new(0)),
            },
            || -> Result<FixedRecognizer> { Err(anyhow!("missing eng.traineddata")) },
            zone(),
            None,
        );

        assert_eq!(detector.detect(), None);
    }

    #[test]
    fn test_no_text_saves_debug_snapshot() {
        let debug = tempdir().unwrap();
        let snapshots = debug.path().join("debug");
        let mut detector = OcrDetector::new(
            FakeCapturer {
                fail: false,
                indicator_shown: Rc::new(Cell::new(0)),
            },
            || -> Result<FixedRecognizer> {
                Ok(FixedRecognizer {
                    text: "",
                    dropped: Rc::new(Cell::new(false)),
                })
            },
            zone(),
            Some(snapshots.clone()),
        );

        assert_eq!(detector.detect(), None);

        let mut names: Vec<String> = std::fs::read_dir(&snapshots)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("capture_") && names[0].ends_with(".png"));
        assert!(names[1].ends_with("_enhanced.png"));

        let raw = image::open(snapshots.join(&names[0])).unwrap().to_rgb8();
        assert_eq!(raw.dimensions(), (58, 10));
    }
}
