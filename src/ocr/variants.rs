//! Best-of-N OCR over a fixed set of preprocessed variants.

use image::RgbImage;
use std::fmt;

use super::engine::{OcrAttempt, Recognizer};
use super::preprocess::{adjust_brightness_contrast, invert_colors, upscale};

/// The preprocessed derivatives of one capture, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Original,
    Brighter,
    BrighterContrast,
    Inverted,
    Upscaled,
}

impl VariantKind {
    pub const ALL: [VariantKind; 5] = [
        VariantKind::Original,
        VariantKind::Brighter,
        VariantKind::BrighterContrast,
        VariantKind::Inverted,
        VariantKind::Upscaled,
    ];

    /// Derives this variant from the captured image.
    pub fn apply(self, capture: &RgbImage) -> RgbImage {
        match self {
            VariantKind::Original => capture.clone(),
            VariantKind::Brighter => adjust_brightness_contrast(capture, 1.3, 0.1),
            VariantKind::BrighterContrast => adjust_brightness_contrast(capture, 1.6, 0.2),
            VariantKind::Inverted => invert_colors(capture),
            VariantKind::Upscaled => upscale(capture, 2.0),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Original => write!(f, "original"),
            VariantKind::Brighter => write!(f, "brighter"),
            VariantKind::BrighterContrast => write!(f, "brighter+contrast"),
            VariantKind::Inverted => write!(f, "inverted"),
            VariantKind::Upscaled => write!(f, "upscaled x2"),
        }
    }
}

/// Builds all five variants of a capture, in evaluation order.
pub fn build_variants(capture: &RgbImage) -> Vec<(VariantKind, RgbImage)> {
    VariantKind::ALL
        .iter()
        .map(|&kind| (kind, kind.apply(capture)))
        .collect()
}

/// Runs every variant through the recognizer and keeps the best result.
///
/// Only attempts with non-empty (trimmed) text count. A later attempt has to
/// be strictly more confident to replace the current best, so among equal
/// confidences the first one wins. A failing variant is logged and skipped.
/// All five variants are always tried.
pub fn recognize_best<R: Recognizer>(capture: &RgbImage, engine: &mut R) -> Option<OcrAttempt> {
    let mut best: Option<OcrAttempt> = None;
    let mut best_confidence: f32 = 0.0;

    for (kind, variant) in build_variants(capture) {
        match engine.recognize(&variant) {
            Ok(attempt) => {
                let text = attempt.text.trim();
                crate::log(&format!(
                    "OCR attempt [{}]: \"{}\" (confidence: {:.2}%)",
                    kind,
                    text,
                    attempt.confidence * 100.0
                ));

                if !text.is_empty() && attempt.confidence > best_confidence {
                    best_confidence = attempt.confidence;
                    best = Some(OcrAttempt {
                        text: text.to_string(),
                        confidence: attempt.confidence,
                    });
                }
            }
            Err(e) => {
                crate::log(&format!("OCR attempt [{}] error: {}", kind, e));
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use image::Rgb;
    use std::collections::VecDeque;

    /// Returns scripted results and records what it was shown.
    struct ScriptedRecognizer {
        script: VecDeque<Result<OcrAttempt>>,
        seen: Vec<RgbImage>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Result<OcrAttempt>>) -> Self {
            Self {
                script: script.into(),
                seen: Vec::new(),
            }
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&mut self, image: &RgbImage) -> Result<OcrAttempt> {
            self.seen.push(image.clone());
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(attempt("", 0.0)))
        }
    }

    fn attempt(text: &str, confidence: f32) -> OcrAttempt {
        OcrAttempt {
            text: text.to_string(),
            confidence,
        }
    }

    fn capture() -> RgbImage {
        RgbImage::from_pixel(20, 6, Rgb([100, 100, 100]))
    }

    #[test]
    fn test_variants_are_built_in_fixed_order() {
        let img = capture();
        let variants = build_variants(&img);
        let kinds: Vec<VariantKind> = variants.iter().map(|(k, _)| *k).collect();

        assert_eq!(kinds, VariantKind::ALL.to_vec());
        assert_eq!(variants[0].1, img);
        // 1.1 * 100 + 0.3 * 255 ~= 186.5
        assert!(variants[1].1.get_pixel(0, 0)[0] > 180);
        // 1.2 * 100 + 0.6 * 255 overflows
        assert_eq!(variants[2].1.get_pixel(0, 0)[0], 255);
        assert_eq!(*variants[3].1.get_pixel(0, 0), Rgb([155, 155, 155]));
        assert_eq!(variants[4].1.dimensions(), (40, 12));
    }

    #[test]
    fn test_first_highest_confidence_wins() {
        let mut engine = ScriptedRecognizer::new(vec![
            Ok(attempt("Coal Tower", 0.10)),
            Ok(attempt("Badham Preschool", 0.55)),
            Ok(attempt("Badham Preschoo", 0.40)),
            Ok(attempt("", 0.0)),
            Ok(attempt("Badham Preschool II", 0.55)),
        ]);

        let best = recognize_best(&capture(), &mut engine).unwrap();

        assert_eq!(best.text, "Badham Preschool");
        assert_eq!(best.confidence, 0.55);
        assert_eq!(engine.seen.len(), 5, "No early exit");
    }

    #[test]
    fn test_recognizer_sees_variants_in_order() {
        let mut engine = ScriptedRecognizer::new(Vec::new());
        let img = capture();

        let _ = recognize_best(&img, &mut engine);

        assert_eq!(engine.seen.len(), 5);
        assert_eq!(engine.seen[0], img);
        assert_eq!(engine.seen[3], invert_colors(&img));
        assert_eq!(engine.seen[4].dimensions(), (40, 12));
    }

    #[test]
    fn test_empty_text_never_wins() {
        let mut engine = ScriptedRecognizer::new(vec![
            Ok(attempt("   ", 0.99)),
            Ok(attempt("", 0.95)),
            Ok(attempt("\n", 0.90)),
            Ok(attempt("", 0.0)),
            Ok(attempt("", 0.0)),
        ]);

        assert!(recognize_best(&capture(), &mut engine).is_none());
    }

    #[test]
    fn test_zero_confidence_text_is_not_selected() {
        let mut engine = ScriptedRecognizer::new(vec![
            Ok(attempt("Garbage", 0.0)),
            Ok(attempt("", 0.0)),
            Ok(attempt("", 0.0)),
            Ok(attempt("", 0.0)),
            Ok(attempt("", 0.0)),
        ]);

        assert!(recognize_best(&capture(), &mut engine).is_none());
    }

    #[test]
    fn test_failed_variant_is_skipped() {
        let mut engine = ScriptedRecognizer::new(vec![
            Err(anyhow!("engine crashed")),
            Ok(attempt("  Dead Dawg Saloon ", 0.72)),
            Err(anyhow!("engine crashed again")),
            Ok(attempt("Dead Dawg", 0.30)),
            Err(anyhow!("still broken")),
        ]);

        let best = recognize_best(&capture(), &mut engine).unwrap();

        assert_eq!(best.text, "Dead Dawg Saloon", "Text is trimmed");
        assert_eq!(engine.seen.len(), 5, "Remaining variants still attempted");
    }

    #[test]
    fn test_all_variants_failing_yields_none() {
        let mut engine = ScriptedRecognizer::new(
            (0..5).map(|_| Err(anyhow!("no engine"))).collect(),
        );

        assert!(recognize_best(&capture(), &mut engine).is_none());
    }
}
