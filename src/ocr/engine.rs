use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

use super::setup::TesseractPaths;

/// Name of the Tesseract config file written into each session.
const SESSION_CONFIG_NAME: &str = "session.config";

/// Text and confidence produced by one recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrAttempt {
    pub text: String,
    /// Mean word confidence in `[0, 1]`
    pub confidence: f32,
}

/// Anything that can turn an image into text with a confidence score.
pub trait Recognizer {
    fn recognize(&mut self, image: &RgbImage) -> Result<OcrAttempt>;
}

/// Opens a recognizer for one detection attempt.
///
/// The recognizer is dropped when the attempt finishes, whatever the outcome.
pub trait RecognizerFactory {
    type Engine: Recognizer;

    fn open(&self) -> Result<Self::Engine>;
}

impl<F, R> RecognizerFactory for F
where
    F: Fn() -> Result<R>,
    R: Recognizer,
{
    type Engine = R;

    fn open(&self) -> Result<R> {
        self()
    }
}

/// Settings used to open a [`TesseractEngine`].
#[derive(Debug, Clone)]
pub struct TesseractSettings {
    pub paths: TesseractPaths,
    pub language: String,
    pub page_seg_mode: Option<u8>,
    /// Applied through `tessedit_char_whitelist` when non-empty
    pub char_whitelist: String,
}

impl RecognizerFactory for TesseractSettings {
    type Engine = TesseractEngine;

    fn open(&self) -> Result<TesseractEngine> {
        let mut engine = TesseractEngine::open(&self.paths, &self.language, self.page_seg_mode)?;

        if !self.char_whitelist.is_empty() {
            // Best effort: recognition still works without the restriction
            if let Err(e) = engine.set_variable("tessedit_char_whitelist", &self.char_whitelist) {
                crate::log(&format!(
                    "Could not apply character whitelist, continuing unrestricted: {}",
                    e
                ));
            }
        }

        Ok(engine)
    }
}

/// A Tesseract session scoped to one detection.
///
/// Owns a scratch directory for variant images, TSV output and the session
/// config file. The directory is removed when the engine is dropped.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
    page_seg_mode: Option<u8>,
    scratch: TempDir,
    config_file: Option<PathBuf>,
    runs: u32,
}

impl TesseractEngine {
    /// Opens a session for the given language.
    pub fn open(paths: &TesseractPaths, language: &str, page_seg_mode: Option<u8>) -> Result<Self> {
        let traineddata = paths.tessdata.join(format!("{}.traineddata", language));
        if !traineddata.exists() {
            return Err(anyhow!(
                "Missing trained data: {}",
                traineddata.display()
            ));
        }

        let scratch = tempfile::Builder::new()
            .prefix("map-overlay-ocr")
            .tempdir()
            .context("Failed to create OCR scratch directory")?;

        Ok(Self {
            executable: paths.executable.clone(),
            tessdata: paths.tessdata.clone(),
            language: language.to_string(),
            page_seg_mode,
            scratch,
            config_file: None,
            runs: 0,
        })
    }

    /// Sets a Tesseract variable for every following recognition.
    pub fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(anyhow!("Invalid Tesseract variable name: {:?}", name));
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(anyhow!("Tesseract variable {} cannot span lines", name));
        }

        let path = self.scratch.path().join(SESSION_CONFIG_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        writeln!(file, "{} {}", name, value)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.config_file = Some(path);
        Ok(())
    }
}

impl Recognizer for TesseractEngine {
    fn recognize(&mut self, image: &RgbImage) -> Result<OcrAttempt> {
        self.runs += 1;
        let input = self.scratch.path().join(format!("variant_{}.png", self.runs));
        let output_base = self.scratch.path().join(format!("result_{}", self.runs));

        image
            .save(&input)
            .with_context(|| format!("Failed to write {}", input.display()))?;

        let mut command = Command::new(&self.executable);
        command
            .arg(&input)
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language);
        if let Some(psm) = self.page_seg_mode {
            command.arg("--psm").arg(psm.to_string());
        }
        if let Some(config) = &self.config_file {
            command.arg(config);
        }
        // TSV output for per-word confidences
        command.arg("tsv");

        let output = command
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        // Tesseract adds the .tsv extension
        let tsv_path = output_base.with_extension("tsv");
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Parses Tesseract TSV output into page text and mean word confidence.
///
/// Words are joined with spaces inside a line and lines with newlines. The
/// confidence is the mean over words with a non-negative score, scaled to
/// `[0, 1]`; it is 0 when no word was recognized.
pub fn parse_tsv_output(tsv: &str) -> OcrAttempt {
    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<&str> = Vec::new();
    let mut conf_sum: f32 = 0.0;
    let mut word_count: usize = 0;

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key.is_some() && current_key != Some(key) && !current_words.is_empty() {
            lines.push(current_words.join(" "));
            current_words.clear();
        }
        current_key = Some(key);

        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if conf >= 0.0 {
            conf_sum += conf;
            word_count += 1;
        }
        current_words.push(text);
    }

    if !current_words.is_empty() {
        lines.push(current_words.join(" "));
    }

    let confidence = if word_count > 0 {
        (conf_sum / word_count as f32 / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    OcrAttempt {
        text: lines.join("\n").trim().to_string(),
        confidence,
    }
}
