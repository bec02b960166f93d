//! OCR over the captured map-name zone.
//!
//! - Image filters (`preprocess`)
//! - Tesseract sessions driven through the CLI (`engine`)
//! - Tesseract discovery and trained-data setup (`setup`)
//! - Best-of-N recognition over preprocessed variants (`variants`)

pub mod engine;
pub mod preprocess;
pub mod setup;
pub mod variants;

pub use engine::{RecognizerFactory, TesseractSettings};
pub use preprocess::enhance_for_ocr;
pub use setup::{ensure_tesseract, TesseractPaths};
pub use variants::recognize_best;
