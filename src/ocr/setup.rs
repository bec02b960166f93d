use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Standard install locations of the UB-Mannheim Windows build.
const COMMON_INSTALL_DIRS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];

#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Locates the Tesseract executable and makes sure the trained data for
/// `language` exists in `tessdata`, copying or downloading it if necessary.
pub fn ensure_tesseract(tessdata: &Path, language: &str) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;
    log(&format!("Tesseract executable: {}", executable.display()));

    let traineddata = tessdata.join(format!("{}.traineddata", language));
    if traineddata.exists() {
        log(&format!("Trained data found at: {}", traineddata.display()));
    } else {
        log(&format!(
            "{}.traineddata not found in {}, fetching...",
            language,
            tessdata.display()
        ));
        fs::create_dir_all(tessdata)
            .with_context(|| format!("Failed to create {}", tessdata.display()))?;
        fetch_traineddata(tessdata, language)?;
    }

    Ok(TesseractPaths {
        executable,
        tessdata: tessdata.to_path_buf(),
    })
}

/// Copies trained data from a system install, or downloads it from GitHub.
fn fetch_traineddata(tessdata: &Path, language: &str) -> Result<()> {
    let file_name = format!("{}.traineddata", language);
    let target = tessdata.join(&file_name);

    for dir in &COMMON_INSTALL_DIRS {
        let system = Path::new(dir).join("tessdata").join(&file_name);
        if system.exists() {
            log(&format!("Copying {} from: {}", file_name, system.display()));
            fs::copy(&system, &target)?;
            return Ok(());
        }
    }

    let url = format!("{}/{}", TESSDATA_REPO, file_name);
    log(&format!("Downloading {}...", url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "map-overlay")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file_name,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&target)?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded {} ({} bytes)", file_name, bytes.len()));

    Ok(())
}

/// Finds the Tesseract executable: next to our executable first, then PATH,
/// then the standard install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = crate::paths::get_exe_dir()
        .join("tesseract")
        .join("tesseract.exe");
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in &COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join("tesseract.exe");
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR:\n\
         1. Download from: https://github.com/UB-Mannheim/tesseract/releases\n\
         2. Run the installer (choose to add to PATH)\n\
         3. Or copy tesseract.exe and its DLLs to: {}",
        crate::paths::get_exe_dir().join("tesseract").display()
    ))
}
